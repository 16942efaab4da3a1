//! Settings records in NOR flash
//!
//! Records live in a `sequential-storage` map spanning a dedicated flash range. The map API is
//! async, the flash drivers are blocking. [AsyncFlash] bridges the two and every access is
//! driven to completion in place.
use core::ops::Range;

use embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash};
use sequential_storage::{cache::NoCache, map};

use crate::settings::{Key, Store, RECORD_SIZE};

pub struct AsyncFlash<T>(pub T);

impl<T: ReadNorFlash> ErrorType for AsyncFlash<T> {
    type Error = T::Error;
}

impl<T: ReadNorFlash> embedded_storage_async::nor_flash::ReadNorFlash
    for AsyncFlash<T>
{
    const READ_SIZE: usize = T::READ_SIZE;

    async fn read(
        &mut self,
        offset: u32,
        bytes: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.0.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl<T: NorFlash> embedded_storage_async::nor_flash::NorFlash
    for AsyncFlash<T>
{
    const WRITE_SIZE: usize = T::WRITE_SIZE;
    const ERASE_SIZE: usize = T::ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.erase(from, to)
    }

    async fn write(
        &mut self,
        offset: u32,
        bytes: &[u8],
    ) -> Result<(), Self::Error> {
        self.0.write(offset, bytes)
    }
}

/// A [Store] in a range of NOR flash.
pub struct FlashStore<F> {
    flash: AsyncFlash<F>,
    range: Range<u32>,
}

impl<F: NorFlash> FlashStore<F> {
    /// Use the erase sector aligned `range` of `flash`. The range must span at least two
    /// sectors.
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self {
            flash: AsyncFlash(flash),
            range,
        }
    }

    pub fn range(&self) -> Range<u32> {
        self.range.clone()
    }

    pub fn release(self) -> F {
        self.flash.0
    }
}

impl<F: NorFlash> Store for FlashStore<F> {
    type Error = sequential_storage::Error<F::Error>;

    fn fetch<'a>(
        &mut self,
        key: Key,
        buffer: &'a mut [u8],
    ) -> Result<Option<&'a [u8]>, Self::Error> {
        embassy_futures::block_on(map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            buffer,
            &u8::from(key),
        ))
    }

    fn store(&mut self, key: Key, data: &[u8]) -> Result<(), Self::Error> {
        let mut buffer = [0u8; RECORD_SIZE];
        embassy_futures::block_on(map::store_item::<u8, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut buffer,
            &u8::from(key),
            &data,
        ))
    }
}

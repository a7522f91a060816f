//! # Settings store
//! Persists the alarm settings in flash as a single record under one key, using
//! `sequential-storage` for wear levelling. The record layout lives in
//! [`smart_snooze_alarmclock::settings`].
use crate::task::resources::FlashResources;
use crate::task::task_messages::{signal_settings_loaded, wait_for_flash_write};
use core::ops::Range;
use defmt::{Debug2Format, Format, info, warn};
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};
use smart_snooze_alarmclock::alarm::AlarmConfig;
use smart_snooze_alarmclock::settings::{self, SETTINGS_RECORD_LEN, SettingsRecord};

/// The size of the flash memory in bytes.
const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Map key of the settings record
const SETTINGS_KEY: u8 = 0;

/// Errors of the settings store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum StorageError {
    /// Reading the record failed
    Read,
    /// Writing the record failed
    Write,
}

/// Reads and writes the settings record
pub struct SettingsStore<'a> {
    /// The flash peripheral
    flash: Flash<'a, FLASH, Async, { FLASH_SIZE }>,
    /// The range of the flash memory used for the settings
    flash_range: Range<u32>,
    /// Scratch buffer for `sequential-storage`
    data_buffer: [u8; 128],
}

impl<'a> SettingsStore<'a> {
    /// Create a store on the last sectors of the flash, clear of the firmware image
    pub const fn new(flash: Flash<'a, FLASH, Async, { FLASH_SIZE }>) -> Self {
        Self {
            flash_range: 0x1F_9000..0x1FC_000,
            data_buffer: [0; 128],
            flash,
        }
    }

    /// Read the stored record, `None` if nothing was ever saved
    pub async fn read(&mut self) -> Result<Option<SettingsRecord>, StorageError> {
        fetch_item::<u8, [u8; SETTINGS_RECORD_LEN], _>(
            &mut self.flash,
            self.flash_range.clone(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &SETTINGS_KEY,
        )
        .await
        .map_err(|e| {
            warn!("Failed to fetch settings: {:?}", Debug2Format(&e));
            StorageError::Read
        })
    }

    /// Replace the stored record
    pub async fn write(&mut self, record: &SettingsRecord) -> Result<(), StorageError> {
        store_item::<u8, [u8; SETTINGS_RECORD_LEN], _>(
            &mut self.flash,
            self.flash_range.clone(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &SETTINGS_KEY,
            record,
        )
        .await
        .map_err(|e| {
            warn!("Failed to store settings: {:?}", Debug2Format(&e));
            StorageError::Write
        })
    }
}

/// This task reads the settings once at startup and hands them to the control task.
/// After that, it writes every record the control task asks it to.
#[embassy_executor::task]
pub async fn settings_store(r: FlashResources) {
    let mut store = SettingsStore::new(Flash::new(r.flash, r.dma_ch));

    let config = match store.read().await {
        Ok(Some(record)) => {
            info!("Read settings record: {:?}", record);
            settings::decode(&record)
        }
        Ok(None) => {
            info!("No settings stored yet, using defaults");
            AlarmConfig::default()
        }
        Err(e) => {
            warn!("Settings unreadable ({:?}), using defaults", e);
            AlarmConfig::default()
        }
    };
    signal_settings_loaded(config);

    loop {
        let record = wait_for_flash_write().await;
        match store.write(&record).await {
            Ok(()) => info!("Settings stored"),
            // the settings stay in effect in memory and are written again on the next save
            Err(e) => warn!("Settings not persisted: {:?}", e),
        }
    }
}

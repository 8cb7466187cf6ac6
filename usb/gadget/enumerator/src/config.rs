use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::usb::LanguageId;

/// Number of string indices the device descriptor claims: manufacturer, product, serial.
pub const DEVICE_STRING_COUNT: usize = 3;

/// How bConfigurationValue relates to a configuration's position in the array.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationNumbering {
    /// Value is index + 1. SET_CONFIGURATION(0) returns the device to the addressed state.
    #[default]
    OneBased,
    /// Value is the index itself.
    ZeroBased,
}

impl ConfigurationNumbering {
    /// bConfigurationValue of the configuration at `index`.
    pub fn value_of(self, index: usize) -> usize {
        match self {
            Self::OneBased => index + 1,
            Self::ZeroBased => index,
        }
    }

    /// Array index selected by a SET_CONFIGURATION value. `None` deselects.
    pub fn index_of(self, value: u16) -> Option<usize> {
        match self {
            Self::OneBased => usize::from(value).checked_sub(1),
            Self::ZeroBased => Some(usize::from(value)),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct EnumeratorConfig {
    /// LANGID reported through string descriptor zero.
    pub language_id: u16,
    /// First string index handed out. Device strings come first, then one per configuration,
    /// then the interfaces' strings.
    pub starting_string_index: u8,
    pub configuration_numbering: ConfigurationNumbering,
    /// Upper bound on every wait for a setup packet. Waits forever when unset.
    pub setup_timeout_ms: Option<u64>,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            language_id: LanguageId::ENGLISH_US.0,
            starting_string_index: 1,
            configuration_numbering: ConfigurationNumbering::OneBased,
            setup_timeout_ms: None,
        }
    }
}

impl EnumeratorConfig {
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn language(&self) -> LanguageId {
        LanguageId(self.language_id)
    }

    /// One past the last device or configuration string index for `configurations`
    /// configurations.
    pub fn fixed_string_end(&self, configurations: usize) -> usize {
        usize::from(self.starting_string_index) + DEVICE_STRING_COUNT + configurations
    }

    /// Checks that the fixed string indices for `configurations` configurations fit in a byte
    /// and that none of them collides with the language descriptor.
    pub fn validate(&self, configurations: usize) -> Result<()> {
        if self.starting_string_index == 0 {
            return Err(Error::OutOfDomain {
                what: "starting string",
                index: 0,
            });
        }

        let end = self.fixed_string_end(configurations);
        if end - 1 > usize::from(u8::MAX) {
            return Err(Error::OutOfDomain {
                what: "string",
                index: end - 1,
            });
        }

        let last_value = self
            .configuration_numbering
            .value_of(configurations.saturating_sub(1));
        if configurations > 0 && last_value > usize::from(u8::MAX) {
            return Err(Error::OutOfDomain {
                what: "configuration",
                index: last_value,
            });
        }

        Ok(())
    }
}

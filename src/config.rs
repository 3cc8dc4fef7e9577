//! Options of the lowering pass and their parsing from pass-option strings.

use std::{str::FromStr, sync::LazyLock};

use regex::Regex;

/// Annotation under which kernel modules carry their CUDA binary unless
/// configured otherwise.
pub const DEFAULT_BLOB_ANNOTATION: &str = "nvvm.cubin";

/// Options of the kernel-to-runtime lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweringConfig {
    blob_annotation: String,
    pointer_bitwidth: u32,
    verbose: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            blob_annotation: String::new(),
            pointer_bitwidth: 64,
            verbose: false,
        }
    }
}

impl LoweringConfig {
    /// Sets the binary annotation key; an empty key selects
    /// [`DEFAULT_BLOB_ANNOTATION`].
    #[must_use]
    pub fn with_blob_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.blob_annotation = annotation.into();
        self
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnsupportedPointerWidth`] unless `bits` is 32 or
    /// 64.
    pub fn with_pointer_bitwidth(mut self, bits: u32) -> Result<Self, ConfigError> {
        if !matches!(bits, 32 | 64) {
            return Err(ConfigError::UnsupportedPointerWidth(bits));
        }
        self.pointer_bitwidth = bits;
        Ok(self)
    }

    /// Enables the status line printed after a successful run.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The annotation the kernel binary is looked up under.
    #[must_use]
    pub fn blob_annotation(&self) -> &str {
        if self.blob_annotation.is_empty() {
            DEFAULT_BLOB_ANNOTATION
        } else {
            &self.blob_annotation
        }
    }

    /// Bit width of `index` and of the runtime's `intptr_t`.
    #[must_use]
    pub const fn pointer_bitwidth(&self) -> u32 {
        self.pointer_bitwidth
    }

    /// Whether a successful run prints a status line.
    #[must_use]
    pub const fn verbose(&self) -> bool {
        self.verbose
    }
}

/// Reasons a pass option string cannot be parsed.
#[derive(Debug, PartialEq, Eq, thiserror::Error, Clone)]
pub enum ConfigError {
    /// An option key that the pass does not know.
    #[error("unknown pass option `{0}`")]
    UnknownOption(String),
    /// A token that is neither `key` nor `key=value`.
    #[error("malformed pass option `{0}`, expected `key=value`")]
    Malformed(String),
    /// A key that needs a value was given without one.
    #[error("pass option `{option}` expects a value")]
    MissingValue {
        /// The option key.
        option: String,
    },
    /// A value that does not parse for its option.
    #[error("invalid value `{value}` for pass option `{option}`")]
    InvalidValue {
        /// The option key.
        option: String,
        /// The rejected value.
        value: String,
    },
    /// A pointer width other than 32 or 64.
    #[error("unsupported pointer bitwidth {0}, must be 32 or 64")]
    UnsupportedPointerWidth(u32),
}

/// Parses whitespace-separated pass options, e.g.
/// `blob-annotation=rocdl.hsaco pointer-bitwidth=32 verbose`.
impl FromStr for LoweringConfig {
    type Err = ConfigError;

    fn from_str(options: &str) -> Result<Self, Self::Err> {
        #[allow(clippy::expect_used)]
        static OPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^([a-z][a-z-]*)(?:=(\S*))?$").expect("Unable to parse regex...")
        });

        let mut config = Self::default();

        for option in options.split_whitespace() {
            let Some(captures) = OPTION_REGEX.captures(option) else {
                return Err(ConfigError::Malformed(String::from(option)));
            };
            let key = captures.get(1).map_or("", |key| key.as_str());
            let value = captures.get(2).map(|value| value.as_str());

            match (key, value) {
                ("blob-annotation", Some(value)) => {
                    config = config.with_blob_annotation(value);
                },
                ("pointer-bitwidth", Some(value)) => {
                    let bits = value.parse().map_err(|_| ConfigError::InvalidValue {
                        option: String::from(key),
                        value: String::from(value),
                    })?;
                    config = config.with_pointer_bitwidth(bits)?;
                },
                ("verbose", None) => config = config.with_verbose(true),
                ("verbose", Some(value)) => {
                    let verbose = value.parse().map_err(|_| ConfigError::InvalidValue {
                        option: String::from(key),
                        value: String::from(value),
                    })?;
                    config = config.with_verbose(verbose);
                },
                ("blob-annotation" | "pointer-bitwidth", None) => {
                    return Err(ConfigError::MissingValue {
                        option: String::from(key),
                    })
                },
                _ => return Err(ConfigError::UnknownOption(String::from(key))),
            }
        }

        Ok(config)
    }
}

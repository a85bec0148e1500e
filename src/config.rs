//! Host configuration: dispatch limits and per-module configuration values.
//!
//! ```toml
//! default_response_capacity = 65536
//! max_response_capacity = 4194304
//! max_call_depth = 64
//!
//! [modules]
//! "bank" = "denom = 'stake'"
//! "staking" = [ 1, 2, 3 ]
//! ```
//!
//! A module value is opaque to the host and passed verbatim to the module's
//! providers: a string is passed as its UTF-8 bytes, an array as raw bytes.

use std::collections::BTreeMap ;
use std::path::Path ;
use pipe_trait::Pipe ;
use serde::{ Deserialize, Serialize };
use thiserror::Error ;

use crate::abi::DEFAULT_RESPONSE_CAPACITY ;
use crate::name::QualifiedName ;



/// Errors loading or validating a [`HostConfig`].
#[derive( Debug, Error )]
pub enum ConfigError {
	#[error( "Failed to read config file: {0}" )] Io( #[from] std::io::Error ),
	#[error( "Failed to parse config TOML: {0}" )] Toml( #[from] toml::de::Error ),
	#[error( "Invalid config: {0}" )] Invalid( String ),
}

/// An opaque per-module configuration value.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( untagged )]
pub enum ConfigValue {
	/// Text, passed as its UTF-8 bytes.
	Text( String ),
	/// Raw bytes.
	Bytes( Vec<u8> ),
}

impl ConfigValue {
	/// The bytes handed to the module's providers.
	pub fn as_bytes( &self ) -> &[u8] { match self {
		Self::Text( text ) => text.as_bytes(),
		Self::Bytes( bytes ) => bytes,
	}}
}

impl From<&str> for ConfigValue { fn from( text: &str ) -> Self { Self::Text( text.to_string() )}}
impl From<String> for ConfigValue { fn from( text: String ) -> Self { Self::Text( text )}}
impl From<Vec<u8>> for ConfigValue { fn from( bytes: Vec<u8> ) -> Self { Self::Bytes( bytes )}}

/// Configuration of the host runtime.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
#[serde( default, deny_unknown_fields )]
pub struct HostConfig {
	default_response_capacity: usize,
	max_response_capacity: usize,
	max_call_depth: u32,
	modules: BTreeMap<QualifiedName, ConfigValue>,
}

impl Default for HostConfig {
	fn default() -> Self {
		Self {
			default_response_capacity: DEFAULT_RESPONSE_CAPACITY,
			max_response_capacity: 4 * 1024 * 1024,
			max_call_depth: 64,
			modules: BTreeMap::new(),
		}
	}
}

impl HostConfig {

	/// Parses and validates a TOML document.
	///
	/// # Errors
	/// [`ConfigError::Toml`] on malformed TOML, [`ConfigError::Invalid`] on out-of-range limits.
	pub fn from_toml_str( contents: &str ) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str( contents )?;
		config.validate()?;
		Ok( config )
	}

	/// Reads, parses and validates a TOML file.
	///
	/// # Errors
	/// See [`HostConfig::from_toml_str`]; also [`ConfigError::Io`] if the file cannot be read.
	pub fn from_file( path: impl AsRef<Path> ) -> Result<Self, ConfigError> {
		std::fs::read_to_string( path )?.pipe_deref( Self::from_toml_str )
	}

	/// Checks the dispatch limits are usable.
	///
	/// # Errors
	/// [`ConfigError::Invalid`] naming the offending limit.
	pub fn validate( &self ) -> Result<(), ConfigError> {
		let limit = i32::MAX as usize ;
		if self.default_response_capacity == 0 || self.max_response_capacity == 0 {
			return Err( ConfigError::Invalid( "response capacities must be non-zero".to_string() ));
		}
		if self.default_response_capacity > self.max_response_capacity {
			return Err( ConfigError::Invalid( format!(
				"default_response_capacity ({}) exceeds max_response_capacity ({})",
				self.default_response_capacity, self.max_response_capacity,
			)));
		}
		if self.max_response_capacity > limit {
			return Err( ConfigError::Invalid( format!( "max_response_capacity exceeds {}", limit )));
		}
		Ok(())
	}

	/// Sets the configuration value of one module, replacing any previous value.
	pub fn with_module_config( mut self, module: impl Into<QualifiedName>, value: impl Into<ConfigValue> ) -> Self {
		self.modules.insert( module.into(), value.into() );
		self
	}

	/// Sets the call-depth limit.
	pub fn with_max_call_depth( mut self, depth: u32 ) -> Self {
		self.max_call_depth = depth ;
		self
	}

	#[inline] pub fn default_response_capacity( &self ) -> usize { self.default_response_capacity }
	#[inline] pub fn max_response_capacity( &self ) -> usize { self.max_response_capacity }
	#[inline] pub fn max_call_depth( &self ) -> u32 { self.max_call_depth }

	/// The bytes configured for `module`; empty if none were.
	pub fn module_config( &self, module: &str ) -> &[u8] {
		self.modules.get( module ).map_or( &[][..], ConfigValue::as_bytes )
	}

	/// Every module that has a configuration value.
	pub fn configured_modules( &self ) -> impl Iterator<Item = &QualifiedName> { self.modules.keys() }

}

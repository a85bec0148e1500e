//! The append-only table of registered modules and their providers.
//!
//! Registration only collects declarations. Graph reasoning happens in the
//! resolver, which reads the table in declaration order: unit load order,
//! then module order within a unit, then provider order within a module.

use std::collections::BTreeSet ;
use std::ffi::c_void ;
use tracing::debug ;

use crate::abi::{ request_bytes, ProviderFn, Status, STATUS_OK };
use crate::error::LinkError ;
use crate::module_info::{ ModuleInfo, ProviderInfo };
use crate::name::QualifiedName ;



/// Identifies one provider: its module and its position within the module.
#[derive( Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash )]
pub struct ProviderRef {
	module: QualifiedName,
	index: usize,
}

impl ProviderRef {
	pub(crate) fn new( module: QualifiedName, index: usize ) -> Self { Self { module, index }}

	/// The module's configuration key.
	#[inline] pub fn module( &self ) -> &QualifiedName { &self.module }

	/// Position of the provider within its module.
	#[inline] pub fn index( &self ) -> usize { self.index }
}

impl std::fmt::Display for ProviderRef {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result {
		write!( f, "{}#{}", self.module, self.index )
	}
}

/// Where a declaration or value came from.
#[derive( Debug, Clone, PartialEq, Eq )]
pub enum Origin {
	/// A registered provider.
	Provider( ProviderRef ),
	/// A value supplied directly by the host.
	Host,
}

impl std::fmt::Display for Origin {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { match self {
		Self::Provider( provider ) => write!( f, "provider {}", provider ),
		Self::Host => write!( f, "host" ),
	}}
}

/// One registered module: its declaration and the matching provider functions.
pub(crate) struct RegisteredModule {
	pub unit: usize,
	pub info: ModuleInfo,
	pub providers: Vec<ProviderFn>,
}

/// Every module registered so far, in declaration order.
#[derive( Default )]
pub(crate) struct ProviderRegistry {
	modules: Vec<RegisteredModule>,
	config_types: BTreeSet<QualifiedName>,
}

impl ProviderRegistry {

	pub fn new() -> Self { Self::default() }

	/// Appends a module.
	///
	/// # Errors
	/// Returns [`LinkError::DuplicateModule`] if its configuration key is taken.
	pub fn register( &mut self, module: RegisteredModule ) -> Result<(), LinkError> {
		if !self.config_types.insert( module.info.config_type.clone() ) {
			return Err( LinkError::DuplicateModule( module.info.config_type ));
		}
		debug!(
			module = %module.info.config_type,
			unit = module.unit,
			providers = module.providers.len(),
			"registered module",
		);
		self.modules.push( module );
		Ok(())
	}

	pub fn modules( &self ) -> &[RegisteredModule] { &self.modules }

	pub fn contains( &self, config_type: &str ) -> bool { self.config_types.contains( config_type ) }

	/// Every provider in declaration order.
	pub fn providers( &self ) -> impl Iterator<Item = ( ProviderRef, &ProviderInfo, ProviderFn )> {
		self.modules.iter().flat_map(| module | module.info.providers.iter()
			.zip( module.providers.iter().copied() )
			.enumerate()
			.map( move |( index, ( info, func ))| ( ProviderRef::new( module.info.config_type.clone(), index ), info, func ))
		)
	}

}

/// Host state threaded through a unit's `register` callback.
pub(crate) struct Registration<'a> {
	pub unit_name: &'a str,
	pub unit: usize,
	pub registry: &'a mut ProviderRegistry,
	pub registered: usize,
	pub failure: Option<LinkError>,
}

impl Registration<'_> {

	unsafe fn accept( &mut self, info: &[u8], providers: *const Option<ProviderFn> ) -> Result<(), LinkError> {
		let malformed = | reason: String | LinkError::MalformedModuleInfo { unit: self.unit_name.to_string(), reason };
		let info = ModuleInfo::decode( info ).map_err(| err | malformed( err.to_string() ))?;
		if !info.config_type.is_well_formed() {
			return Err( malformed( format!( "malformed module name '{}'", info.config_type )));
		}
		let count = info.providers.len();
		let providers = match ( providers.is_null(), count ) {
			( _, 0 ) => Vec::with_capacity( 0 ),
			( true, _ ) => return Err( malformed( format!( "module '{}' declares {} providers but passed none", info.config_type, count ))),
			// SAFETY: the unit passes an array of `count` entries.
			( false, _ ) => std::slice::from_raw_parts( providers, count ).iter()
				.enumerate()
				.map(|( index, func )| func.ok_or_else(|| malformed( format!( "provider {} of module '{}' is null", index, info.config_type ))))
				.collect::<Result<Vec<_>, _>>()?,
		};
		self.registry.register( RegisteredModule { unit: self.unit, info, providers })?;
		self.registered += 1 ;
		Ok(())
	}

}

/// [`RegisterModuleFn`]( crate::abi::RegisterModuleFn ) handed to units.
pub(crate) unsafe extern "C" fn register_module(
	host: *mut c_void,
	module_info_size: usize,
	module_info: *const u8,
	providers: *const Option<ProviderFn>,
) -> Status {
	// SAFETY: `host` is the `Registration` passed alongside this callback.
	let Some( registration ) = host.cast::<Registration<'_>>().as_mut() else { return -1 };
	if registration.failure.is_some() { return -1 }
	match registration.accept( request_bytes( module_info, module_info_size ), providers ) {
		Ok(()) => STATUS_OK,
		Err( err ) => {
			registration.failure = Some( err );
			-1
		}
	}
}

//! The startup sequence: descriptor exchange, registration, resolution and linking.
//!
//! [`Host`] is a consuming builder. Each step takes the host by value, so a
//! failed step drops everything collected so far and a successful
//! [`Host::link`] leaves nothing behind that could be linked a second time.

use std::collections::{ BTreeMap, BTreeSet };
use std::sync::Arc ;
use nonempty_collections::nev ;
use pipe_trait::Pipe ;
use tracing::{ info, warn };

use crate::abi::{ RawService, STATUS_OK };
use crate::config::HostConfig ;
use crate::descriptor::{ receive_descriptor, DescriptorCatalogue, DescriptorExchange };
use crate::error::{ LinkError, LoadPhase };
use crate::module_info::Kind ;
use crate::name::QualifiedName ;
use crate::policy::{ AllowAll, CallPolicy };
use crate::registry::{ register_module, Origin, ProviderRef, ProviderRegistry, Registration };
use crate::resolver ;
use crate::runtime::Runtime ;
use crate::service::DispatchRules ;
use crate::unit::CodeUnit ;



/// Collects code units and links them into a [`Runtime`].
///
/// ```
/// use module_link::{ Host, HostConfig };
///
/// let runtime = Host::new( HostConfig::default() ).link()?;
/// assert!( runtime.execution_order().is_empty() );
/// # Ok::<(), module_link::LinkError>(())
/// ```
pub struct Host {
	config: HostConfig,
	catalogue: DescriptorCatalogue,
	registry: ProviderRegistry,
	supplied: BTreeMap<QualifiedName, RawService>,
	policy: Arc<dyn CallPolicy>,
	units: Vec<CodeUnit>,
}

impl std::fmt::Debug for Host {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.debug_struct( "Host" )
			.field( "units", &self.units )
			.field( "descriptors", &self.catalogue.len() )
			.field( "modules", &self.registry.modules().len() )
			.field( "supplied", &self.supplied.keys().collect::<Vec<_>>() )
			.finish_non_exhaustive()
	}
}

impl Host {

	/// An empty host admitting every call the admission rules admit.
	pub fn new( config: HostConfig ) -> Self {
		Self {
			config,
			catalogue: DescriptorCatalogue::new(),
			registry: ProviderRegistry::new(),
			supplied: BTreeMap::new(),
			policy: Arc::new( AllowAll ),
			units: Vec::new(),
		}
	}

	/// Sets the policy every call is checked against after the admission rules.
	pub fn with_policy( mut self, policy: impl CallPolicy + 'static ) -> Self {
		self.policy = Arc::new( policy );
		self
	}

	/// The descriptors merged so far.
	#[inline] pub fn catalogue( &self ) -> &DescriptorCatalogue { &self.catalogue }

	/// Supplies a service directly. It counts as the only producer of its
	/// service type and is bound before any provider runs.
	///
	/// # Safety
	/// `service` must follow the module ABI: its method table must stay valid
	/// until [`Host::link`] returns and its functions, together with its
	/// instance, for as long as the linked runtime exists.
	///
	/// # Errors
	/// Returns [`LinkError::DuplicateOutput`] if the type is already supplied.
	pub unsafe fn supply_service( mut self, name: impl Into<QualifiedName>, service: RawService ) -> Result<Self, LinkError> {
		let name = name.into();
		if self.supplied.contains_key( &name ) {
			return Err( LinkError::DuplicateOutput {
				kind: Kind::Service( name ),
				producers: nev![ Origin::Host, Origin::Host ],
			});
		}
		self.supplied.insert( name, service );
		Ok( self )
	}

	/// Loads a unit: merges its descriptors, then registers its modules.
	///
	/// # Errors
	/// - [`LinkError::UnitFailed`] if either entry point returns a non-zero status
	/// - [`LinkError::MalformedDescriptor`] / [`LinkError::MalformedModuleInfo`] on undecodable payloads
	/// - [`LinkError::DescriptorConflict`] if a descriptor clashes with one already merged
	/// - [`LinkError::DuplicateModule`] if a module's key is already registered
	pub fn load( mut self, unit: CodeUnit ) -> Result<Self, LinkError> {

		let mut exchange = DescriptorExchange::new( unit.name() );
		// SAFETY: `CodeUnit::new` guarantees the entry point follows the ABI;
		// `exchange` outlives the call.
		let status = unsafe { ( unit.read_descriptors() )(
			( &mut exchange as *mut DescriptorExchange<'_> ).cast(),
			receive_descriptor,
		)};
		if let Some( failure ) = exchange.failure { return Err( failure ) }
		if status != STATUS_OK {
			return Err( LinkError::UnitFailed { unit: unit.name().to_string(), phase: LoadPhase::Descriptors, status });
		}
		let descriptors = exchange.received.len();
		for descriptor in exchange.received { self.catalogue.merge( descriptor )?; }

		let mut registration = Registration {
			unit_name: unit.name(),
			unit: self.units.len(),
			registry: &mut self.registry,
			registered: 0,
			failure: None,
		};
		// SAFETY: as above, with `registration` outliving the call.
		let status = unsafe { ( unit.register_modules() )(
			( &mut registration as *mut Registration<'_> ).cast(),
			register_module,
		)};
		if let Some( failure ) = registration.failure { return Err( failure ) }
		if status != STATUS_OK {
			return Err( LinkError::UnitFailed { unit: unit.name().to_string(), phase: LoadPhase::Registration, status });
		}
		let modules = registration.registered ;

		info!( unit = unit.name(), descriptors, modules, "loaded unit" );
		self.units.push( unit );
		Ok( self )

	}

	/// Computes the execution order without running any provider.
	///
	/// # Errors
	/// Any resolution error [`Host::link`] would report before running providers.
	pub fn resolve( &self ) -> Result<Vec<ProviderRef>, LinkError> {
		let supplied = self.supplied.keys().cloned().collect::<BTreeSet<_>>();
		resolver::resolve( &self.registry, &self.catalogue, &supplied )?.references().pipe( Ok )
	}

	/// Resolves the graph and runs every provider in order, producing the
	/// frozen runtime.
	///
	/// # Errors
	/// The first [`LinkError`] raised by resolution or by a provider. No
	/// provider runs if resolution fails, and none after a failing one.
	pub fn link( self ) -> Result<Runtime, LinkError> {

		self.config.configured_modules()
			.filter(| module | !self.registry.contains( module.as_str() ))
			.for_each(| module | warn!( %module, "configuration supplied for a module no unit registers" ));

		let rules = Arc::new( DispatchRules {
			policy: Arc::clone( &self.policy ),
			max_call_depth: self.config.max_call_depth(),
			default_response_capacity: self.config.default_response_capacity(),
		});
		let supplied = self.supplied.keys().cloned().collect::<BTreeSet<_>>();
		let resolution = resolver::resolve( &self.registry, &self.catalogue, &supplied )?;
		// SAFETY: supplied services were accepted through `supply_service`.
		let graph = unsafe { crate::linker::link( &resolution, &self.catalogue, &self.config, &self.supplied, rules )? };

		info!(
			providers = graph.order.len(),
			services = graph.services.len(),
			listeners = graph.listeners.values().map( Vec::len ).sum::<usize>(),
			"link complete",
		);
		Runtime::new( self.config, self.catalogue, graph, self.units ).pipe( Ok )

	}

}

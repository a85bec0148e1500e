//! Runs providers in resolved order and binds what they produce.
//!
//! Linking is single-threaded and all-or-nothing: the first failing provider
//! aborts it, no later provider runs, and nothing bound so far is exposed.

use std::collections::BTreeMap ;
use std::ffi::c_void ;
use std::sync::Arc ;
use tracing::{ debug, trace };

use crate::abi::{ RawBuffer, RawService, Status, PROVIDER_ERROR_CAPACITY, STATUS_OK };
use crate::client::{ ClientSlot, RawClient };
use crate::config::HostConfig ;
use crate::descriptor::{ DescriptorCatalogue, ServiceKind };
use crate::error::LinkError ;
use crate::module_info::{ Kind, OutputSpec };
use crate::name::QualifiedName ;
use crate::registry::{ Origin, ProviderRef };
use crate::resolver::{ ProviderNode, Resolution };
use crate::service::{ BoundService, DispatchRules };



/// Everything linking produced. Frozen from here on.
pub(crate) struct LinkedGraph {
	pub services: BTreeMap<QualifiedName, Arc<BoundService>>,
	pub listeners: BTreeMap<QualifiedName, Vec<Arc<BoundService>>>,
	pub lifecycle: Vec<Arc<BoundService>>,
	pub clients: Vec<ClientSlot>,
	pub order: Vec<ProviderRef>,
}

struct Linker<'a> {
	catalogue: &'a DescriptorCatalogue,
	rules: Arc<DispatchRules>,
	graph: LinkedGraph,
}

/// Binds host-supplied services, then runs every provider of `resolution` in order.
///
/// # Safety
/// Every supplied service's method table must be valid as described by
/// [`Host::supply_service`]( crate::Host::supply_service ).
///
/// # Errors
/// - [`LinkError::OutputShape`] if a method table disagrees with its descriptor
/// - [`LinkError::ProviderInit`] if a provider fails
/// - [`LinkError::OutputArity`] if a provider registers the wrong number of outputs
pub(crate) unsafe fn link(
	resolution: &Resolution<'_>,
	catalogue: &DescriptorCatalogue,
	config: &HostConfig,
	supplied: &BTreeMap<QualifiedName, RawService>,
	rules: Arc<DispatchRules>,
) -> Result<LinkedGraph, LinkError> {

	let mut linker = Linker {
		catalogue,
		rules,
		graph: LinkedGraph {
			services: BTreeMap::new(),
			listeners: BTreeMap::new(),
			lifecycle: Vec::with_capacity( 0 ),
			clients: Vec::new(),
			order: resolution.references(),
		},
	};

	for ( name, raw ) in supplied {
		let kind = Kind::Service( name.clone() );
		let service = linker.bind( Origin::Host, &kind, raw )?;
		linker.store( &kind, service );
	}
	for node in resolution.ordered() {
		linker.run( node, config.module_config( node.reference.module().as_str() ))?;
	}
	Ok( linker.graph )

}

impl Linker<'_> {

	unsafe fn bind( &self, origin: Origin, kind: &Kind, raw: &RawService ) -> Result<BoundService, LinkError> {
		let shape = self.catalogue.service( kind.name().as_str() )
			.ok_or_else(|| LinkError::UndeclaredKind { kind: kind.clone(), origin: origin.clone() })?;
		let expected = shape.methods.len();
		let actual = match raw.methods.is_null() { true => 0, false => raw.method_count };
		if actual != expected {
			return Err( LinkError::OutputShape { origin, kind: kind.clone(), expected, actual });
		}
		Ok( BoundService::bind( kind.name().clone(), shape, origin, raw, Arc::clone( &self.rules )))
	}

	fn store( &mut self, kind: &Kind, service: BoundService ) {
		let service = Arc::new( service );
		match kind {
			Kind::Service( name ) => {
				if service.kind() == ServiceKind::Lifecycle { self.graph.lifecycle.push( Arc::clone( &service )); }
				self.graph.services.insert( name.clone(), service );
			},
			Kind::EventListener( name ) => self.graph.listeners.entry( name.clone() ).or_default().push( service ),
		}
	}

	/// A client for every declared input, or null for an absent optional one.
	fn gather_inputs( &mut self, node: &ProviderNode<'_> ) -> Vec<*const RawClient> {
		let owner = node.reference.module();
		let mut inputs = Vec::with_capacity( node.info.inputs.len() );
		for input in &node.info.inputs {
			let slot = match &input.kind {
				Kind::Service( name ) => self.graph.services.get( name )
					.map(| service | ClientSlot::service( owner.clone(), Arc::clone( service ))),
				Kind::EventListener( name ) => self.graph.listeners.get( name )
					.filter(| listeners | !listeners.is_empty() )
					.map(| listeners | ClientSlot::listeners( owner.clone(), listeners.clone() )),
			};
			inputs.push( slot.map_or( std::ptr::null(), | slot | {
				let ptr = slot.as_ptr();
				self.graph.clients.push( slot );
				ptr
			}));
		}
		inputs
	}

	unsafe fn run( &mut self, node: &ProviderNode<'_>, config: &[u8] ) -> Result<(), LinkError> {

		let provider = &node.reference ;
		let inputs = self.gather_inputs( node );
		let mut collector = OutputCollector {
			linker: &*self,
			provider,
			expected: &node.info.outputs,
			produced: Vec::with_capacity( node.info.outputs.len() ),
			calls: 0,
			failure: None,
		};
		let mut storage = vec![ 0u8; PROVIDER_ERROR_CAPACITY ];
		let mut error = RawBuffer::new( &mut storage );

		trace!( %provider, inputs = inputs.len(), config = config.len(), "invoking provider" );
		let status = ( node.func )(
			config.len(),
			config.as_ptr(),
			inputs.as_ptr(),
			( &mut collector as *mut OutputCollector<'_, '_> ).cast(),
			register_output,
			&mut error,
		);

		// A refused registration takes precedence over the status the provider returns.
		let OutputCollector { produced, calls, failure, .. } = collector ;
		if let Some( failure ) = failure { return Err( failure ) }
		if calls > node.info.outputs.len() {
			return Err( LinkError::OutputArity { provider: provider.clone(), expected: node.info.outputs.len(), actual: calls });
		}
		if status != STATUS_OK || error.len > 0 {
			return Err( LinkError::ProviderInit {
				provider: provider.clone(),
				status,
				message: error.written_message(),
			});
		}
		if calls != node.info.outputs.len() {
			return Err( LinkError::OutputArity { provider: provider.clone(), expected: node.info.outputs.len(), actual: calls });
		}

		for ( output, service ) in node.info.outputs.iter().zip( produced ) {
			self.store( &output.kind, service );
		}
		debug!( %provider, outputs = calls, "provider linked" );
		Ok(())

	}

}

/// Host state threaded through a provider's `register_output` callback.
struct OutputCollector<'l, 'c> {
	linker: &'l Linker<'c>,
	provider: &'l ProviderRef,
	expected: &'l [OutputSpec],
	produced: Vec<BoundService>,
	calls: usize,
	failure: Option<LinkError>,
}

/// [`RegisterOutputFn`]( crate::abi::RegisterOutputFn ) handed to providers.
unsafe extern "C" fn register_output( host: *mut c_void, output: *const RawService ) -> Status {
	// SAFETY: `host` is the `OutputCollector` passed alongside this callback.
	let Some( collector ) = host.cast::<OutputCollector<'_, '_>>().as_mut() else { return -1 };
	let index = collector.calls ;
	collector.calls += 1 ;
	if collector.failure.is_some() { return -1 }
	let Some( output_spec ) = collector.expected.get( index ) else { return -1 };
	let raw = output.as_ref().copied().unwrap_or( RawService {
		instance: std::ptr::null_mut(),
		method_count: 0,
		methods: std::ptr::null(),
	});
	match collector.linker.bind( Origin::Provider( collector.provider.clone() ), &output_spec.kind, &raw ) {
		Ok( service ) => {
			collector.produced.push( service );
			STATUS_OK
		},
		Err( err ) => {
			collector.failure = Some( err );
			-1
		}
	}
}

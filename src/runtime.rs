use std::collections::BTreeMap ;
use std::sync::Arc ;
use tracing::debug ;

use crate::call_error::CallError ;
use crate::client::ClientSlot ;
use crate::config::HostConfig ;
use crate::context::{ CallContext, Caller };
use crate::descriptor::{ DescriptorCatalogue, ServiceKind };
use crate::linker::LinkedGraph ;
use crate::name::QualifiedName ;
use crate::registry::ProviderRef ;
use crate::service::{ BoundService, MethodIndex };
use crate::unit::CodeUnit ;



/// A linked module graph, ready to serve calls.
///
/// The graph is frozen: bound services never change and there is no way to
/// register, resolve or link again. A second startup sequence needs a new
/// [`Host`]( crate::Host ).
///
/// ```compile_fail
/// # fn relink( runtime: module_link::Runtime ) {
/// let _ = runtime.link();
/// # }
/// ```
///
/// The runtime owns every loaded [`CodeUnit`] and every client handed to a
/// provider, so their pointers stay valid for as long as it lives.
pub struct Runtime {
	config: HostConfig,
	catalogue: DescriptorCatalogue,
	services: BTreeMap<QualifiedName, Arc<BoundService>>,
	listeners: BTreeMap<QualifiedName, Vec<Arc<BoundService>>>,
	lifecycle: Vec<Arc<BoundService>>,
	order: Vec<ProviderRef>,
	_clients: Vec<ClientSlot>,
	_units: Vec<CodeUnit>,
}

impl std::fmt::Debug for Runtime {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.debug_struct( "Runtime" )
			.field( "services", &self.services.keys().collect::<Vec<_>>() )
			.field( "listeners", &self.listeners.keys().collect::<Vec<_>>() )
			.field( "order", &self.order )
			.finish_non_exhaustive()
	}
}

impl Runtime {

	pub(crate) fn new( config: HostConfig, catalogue: DescriptorCatalogue, graph: LinkedGraph, units: Vec<CodeUnit> ) -> Self {
		let LinkedGraph { services, listeners, lifecycle, clients, order } = graph ;
		Self { config, catalogue, services, listeners, lifecycle, order, _clients: clients, _units: units }
	}

	/// The bound service of a service type.
	pub fn service( &self, name: &str ) -> Option<&Arc<BoundService>> { self.services.get( name )}

	/// Every bound listener of an event-listener type, in execution order.
	pub fn listeners( &self, name: &str ) -> &[Arc<BoundService>] {
		self.listeners.get( name ).map_or( &[][..], Vec::as_slice )
	}

	/// The order providers ran in.
	#[inline] pub fn execution_order( &self ) -> &[ProviderRef] { &self.order }

	/// The merged descriptor catalogue.
	#[inline] pub fn descriptors( &self ) -> &DescriptorCatalogue { &self.catalogue }

	#[inline] pub fn config( &self ) -> &HostConfig { &self.config }

	/// Calls a unary method into a freshly allocated buffer of the method's
	/// declared capacity and returns the response bytes.
	///
	/// When a [`ServiceKind::Query`] method reports [`CallError::BufferTooSmall`],
	/// the call is repeated with a buffer of twice the size, up to the
	/// configured maximum. Other kinds are never retried, since a repeated
	/// call could mutate state twice.
	///
	/// # Errors
	/// [`CallError::NotFound`] for an unknown service or method, otherwise
	/// whatever the call returns.
	pub fn call_owned( &self, service: &str, context: &CallContext<'_>, method: &str, request: &[u8] ) -> Result<Vec<u8>, CallError> {
		let bound = self.service( service )
			.ok_or_else(|| CallError::NotFound( format!( "no service {}", service )))?;
		let index = method_of( bound, method )?;
		let max = self.config.max_response_capacity();
		let mut capacity = bound.response_capacity( index ).clamp( 1, max.max( 1 ));
		loop {
			let mut response = vec![ 0u8; capacity ];
			match bound.invoke_unary( context, index, request, &mut response ) {
				Ok( written ) => {
					response.truncate( written );
					return Ok( response );
				},
				Err( CallError::BufferTooSmall( _ )) if bound.kind() == ServiceKind::Query && capacity < max => {
					capacity = capacity.saturating_mul( 2 ).clamp( capacity + 1, max );
					debug!( service, method, capacity, "retrying query with a larger buffer" );
				},
				Err( err ) => return Err( err ),
			}
		}
	}

	/// Calls a unary method on every listener of an event-listener type, in
	/// execution order, discarding responses. Stops at the first failure.
	/// Returns how many listeners were called.
	///
	/// # Errors
	/// The first [`CallError`] a listener returns.
	pub fn emit( &self, listener: &str, context: &CallContext<'_>, method: &str, request: &[u8] ) -> Result<usize, CallError> {
		let listeners = self.listeners( listener );
		for bound in listeners {
			let index = method_of( bound, method )?;
			let mut response = vec![ 0u8; bound.response_capacity( index )];
			bound.invoke_unary( context, index, request, &mut response )?;
		}
		Ok( listeners.len() )
	}

	/// Calls a unary method on every lifecycle service that has it, in
	/// execution order, as the host. Returns how many services were called.
	///
	/// # Errors
	/// The first [`CallError`] a lifecycle service returns.
	pub fn run_lifecycle( &self, method: &str, request: &[u8] ) -> Result<usize, CallError> {
		let context = CallContext::new( Caller::Host );
		let mut called = 0 ;
		for bound in &self.lifecycle {
			let Some( index ) = bound.method_index( method ) else { continue };
			let mut response = vec![ 0u8; bound.response_capacity( index )];
			bound.invoke_unary( &context, index, request, &mut response )?;
			called += 1 ;
		}
		debug!( method, called, "ran lifecycle hook" );
		Ok( called )
	}

}

fn method_of( bound: &BoundService, method: &str ) -> Result<MethodIndex, CallError> {
	bound.method_index( method ).ok_or_else(|| CallError::NotFound( format!( "{} has no method {}", bound.name(), method )))
}

//! Client handles handed to providers for their inputs.
//!
//! A provider never receives another module's method table directly. Each
//! input is a host-owned [`RawClient`] bound to the consuming module: every
//! call made through it runs under a context nested in the caller's, with the
//! consuming module as caller. A callee therefore always sees the identity
//! the host assigned, whatever context the calling unit passed in.
//!
//! Clients for event-listener inputs fan a unary call out to every bound
//! listener, in execution order.

use std::ffi::c_void ;
use std::sync::Arc ;

use crate::abi::{ request_bytes, response_buffer, ItemSinkFn, ItemSourceFn, DEFAULT_RESPONSE_CAPACITY };
use crate::call_error::CallError ;
use crate::context::CallContext ;
use crate::name::QualifiedName ;
use crate::service::{ BoundService, MethodIndex };
use crate::stream::{ ItemSink, ItemReader, ItemSource };



/// Unary call through a client: `( client, method, context, request_size, request, response_capacity, response )`.
pub type ClientUnaryFn = unsafe extern "C" fn(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	response_capacity: usize,
	response: *mut u8,
) -> i32 ;

/// Server-streaming call through a client.
pub type ClientServerStreamFn = unsafe extern "C" fn(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	sink: *mut c_void,
	emit: ItemSinkFn,
	error_capacity: usize,
	error: *mut u8,
) -> i32 ;

/// Client-streaming call through a client.
pub type ClientClientStreamFn = unsafe extern "C" fn(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	source: *mut c_void,
	next: ItemSourceFn,
	response_capacity: usize,
	response: *mut u8,
) -> i32 ;

/// A host-owned handle to one input of a provider.
///
/// Foreign units read the `#[repr( C )]` layout and call through the function
/// pointers, passing the client itself back as first argument. Methods are
/// addressed by their index in the service descriptor.
#[repr( C )]
pub struct RawClient {
	handle: *const c_void,
	method_count: usize,
	unary: ClientUnaryFn,
	server_stream: ClientServerStreamFn,
	client_stream: ClientClientStreamFn,
}

impl std::fmt::Debug for RawClient {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.debug_struct( "RawClient" ).field( "method_count", &self.method_count ).finish_non_exhaustive()
	}
}

impl RawClient {

	/// Number of methods of the bound service type.
	#[inline] pub fn method_count( &self ) -> usize { self.method_count }

	/// Calls a unary method, borrowing the written part of `response`.
	///
	/// # Errors
	/// Any [`CallError`] raised by the host or the callee.
	pub fn call<'r>( &self, context: &CallContext<'_>, method: usize, request: &[u8], response: &'r mut [u8] ) -> Result<&'r [u8], CallError> {
		// SAFETY: clients are only built by the host, whose trampolines uphold the ABI.
		let status = unsafe { ( self.unary )( self, method, context, request.len(), request.as_ptr(), response.len(), response.as_mut_ptr() )};
		let written = CallError::check( status, response )?;
		Ok( &response[ ..written ])
	}

	/// Calls a server-streaming method, handing every item to `on_item`.
	///
	/// # Errors
	/// Any [`CallError`] raised by the host, the callee or `on_item`.
	pub fn call_server_stream<F>( &self, context: &CallContext<'_>, method: usize, request: &[u8], on_item: F ) -> Result<(), CallError>
	where
		F: FnMut( &[u8] ) -> Result<(), CallError>,
	{
		let mut sink = ItemSink::new( on_item );
		let ( sink_ptr, emit ) = sink.as_raw();
		let mut error = vec![ 0u8; DEFAULT_RESPONSE_CAPACITY ];
		// SAFETY: see `call`.
		let status = unsafe { ( self.server_stream )( self, method, context, request.len(), request.as_ptr(), sink_ptr, emit, error.len(), error.as_mut_ptr() )};
		sink.finish( status, &error )
	}

	/// Calls a client-streaming method with `items`.
	///
	/// # Errors
	/// Any [`CallError`] raised by the host or the callee.
	pub fn call_client_stream<I>( &self, context: &CallContext<'_>, method: usize, items: I, response: &mut [u8] ) -> Result<usize, CallError>
	where
		I: IntoIterator,
		I::Item: AsRef<[u8]>,
	{
		let mut source = ItemSource::new( items.into_iter() );
		let ( source_ptr, next ) = source.as_raw();
		// SAFETY: see `call`.
		let status = unsafe { ( self.client_stream )( self, method, context, source_ptr, next, response.len(), response.as_mut_ptr() )};
		CallError::check( status, response )
	}

}

enum Binding {
	Service( Arc<BoundService> ),
	Listeners( Vec<Arc<BoundService>> ),
}

/// What a client forwards to, and on whose behalf.
struct ClientTarget {
	owner: QualifiedName,
	binding: Binding,
}

impl ClientTarget {

	fn unary( &self, context: &CallContext<'_>, method: MethodIndex, request: &[u8], response: &mut [u8] ) -> Result<usize, CallError> {
		match &self.binding {
			Binding::Service( service ) => service.invoke_unary( context, method, request, response ),
			Binding::Listeners( listeners ) => {
				for listener in listeners { listener.invoke_unary( context, method, request, response )?; }
				Ok( 0 )
			},
		}
	}

	fn service( &self, method: MethodIndex ) -> Result<&BoundService, CallError> { match &self.binding {
		Binding::Service( service ) => Ok( service ),
		Binding::Listeners( _ ) => Err( CallError::NotFound( format!( "method #{} cannot stream to listeners", method.0 ))),
	}}

}

/// Owns a client and its target for as long as the runtime lives.
pub(crate) struct ClientSlot {
	raw: Box<RawClient>,
	_target: Box<ClientTarget>,
}

// SAFETY: the client and its target are immutable once built, and bound
// services are themselves `Send + Sync`.
unsafe impl Send for ClientSlot {}
unsafe impl Sync for ClientSlot {}

impl ClientSlot {

	/// A client for one bound service, used on behalf of `owner`.
	pub fn service( owner: QualifiedName, service: Arc<BoundService> ) -> Self {
		let method_count = service.methods().count();
		Self::new( owner, Binding::Service( service ), method_count )
	}

	/// A client fanning out to every listener in `listeners`, used on behalf of `owner`.
	pub fn listeners( owner: QualifiedName, listeners: Vec<Arc<BoundService>> ) -> Self {
		let method_count = listeners.first().map_or( 0, | listener | listener.methods().count() );
		Self::new( owner, Binding::Listeners( listeners ), method_count )
	}

	fn new( owner: QualifiedName, binding: Binding, method_count: usize ) -> Self {
		let target = Box::new( ClientTarget { owner, binding });
		let raw = Box::new( RawClient {
			handle: ( &*target as *const ClientTarget ).cast(),
			method_count,
			unary: client_unary,
			server_stream: client_server_stream,
			client_stream: client_client_stream,
		});
		Self { raw, _target: target }
	}

	/// Stable for the lifetime of the slot.
	pub fn as_ptr( &self ) -> *const RawClient { &*self.raw }

}

/// Recovers the target behind a client pointer.
unsafe fn resolve_target<'a>( client: *const RawClient ) -> Option<&'a ClientTarget> {
	client.as_ref().and_then(| client | client.handle.cast::<ClientTarget>().as_ref() )
}

fn status_of( written: usize, response: &mut [u8] ) -> i32 {
	i32::try_from( written ).unwrap_or_else(| _ | CallError::BufferTooSmall(
		format!( "{} bytes cannot be reported", written ),
	).write_into( response ))
}

unsafe extern "C" fn client_unary(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	response_capacity: usize,
	response: *mut u8,
) -> i32 {
	let response = response_buffer( response, response_capacity );
	let Some( target ) = resolve_target( client ) else { return CallError::NotFound( "null client".into() ).write_into( response ) };
	let context = context.nested( target.owner.as_str() );
	match target.unary( &context, MethodIndex( method ), request_bytes( request, request_size ), response ) {
		Ok( written ) => status_of( written, response ),
		Err( err ) => err.write_into( response ),
	}
}

unsafe extern "C" fn client_server_stream(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	sink: *mut c_void,
	emit: ItemSinkFn,
	error_capacity: usize,
	error: *mut u8,
) -> i32 {
	let error = response_buffer( error, error_capacity );
	let Some( target ) = resolve_target( client ) else { return CallError::NotFound( "null client".into() ).write_into( error ) };
	let context = context.nested( target.owner.as_str() );
	let method = MethodIndex( method );
	let result = target.service( method ).and_then(| service | {
		service.call_server_stream( &context, method, request_bytes( request, request_size ), | item | {
			match emit( sink, item.len(), item.as_ptr() ) {
				0 => Ok(()),
				status => Err( CallError::from_status( status, b"consumer stopped the stream" )),
			}
		})
	});
	match result {
		Ok(()) => 0,
		Err( err ) => err.write_into( error ),
	}
}

unsafe extern "C" fn client_client_stream(
	client: *const RawClient,
	method: usize,
	context: &CallContext<'_>,
	source: *mut c_void,
	next: ItemSourceFn,
	response_capacity: usize,
	response: *mut u8,
) -> i32 {
	let response = response_buffer( response, response_capacity );
	let Some( target ) = resolve_target( client ) else { return CallError::NotFound( "null client".into() ).write_into( response ) };
	let context = context.nested( target.owner.as_str() );
	let method = MethodIndex( method );
	let service = match target.service( method ) {
		Ok( service ) => service,
		Err( err ) => return err.write_into( response ),
	};
	let mut failure = None ;
	let items = ItemReader::new( source, next )
		.map_while(| item | item.map_err(| err | failure = Some( err )).ok() );
	let result = service.call_client_stream( &context, method, items, &mut *response );
	match ( failure, result ) {
		( Some( err ), _ ) | ( None, Err( err )) => err.write_into( response ),
		( None, Ok( written )) => status_of( written, response ),
	}
}

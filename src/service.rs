//! Bound services: the immutable, callable result of linking.
//!
//! A bound service is a fixed-order table of method handles taken from its
//! provider, paired with the method descriptors of its service type. Call
//! sites resolve a method name to a [`MethodIndex`] once and dispatch by
//! index afterwards. Every call passes the admission rules of the service's
//! kind, the host's [`CallPolicy`] and the call-depth limit before the
//! method runs.

use std::ffi::c_void ;
use std::sync::Arc ;
use tracing::debug ;

use crate::abi::{ RawMethod, RawService };
use crate::call_error::CallError ;
use crate::context::{ CallContext, Caller };
use crate::descriptor::{ MethodDescriptor, ServiceKind, ServiceShape, StreamingMode };
use crate::name::QualifiedName ;
use crate::policy::CallPolicy ;
use crate::registry::Origin ;
use crate::stream::{ ItemSink, ItemSource };



/// Position of a method in its service's method table.
#[derive( Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash )]
pub struct MethodIndex( pub usize );

/// Dispatch settings shared by every bound service of one runtime.
pub(crate) struct DispatchRules {
	pub policy: Arc<dyn CallPolicy>,
	pub max_call_depth: u32,
	pub default_response_capacity: usize,
}

struct BoundMethod {
	descriptor: MethodDescriptor,
	raw: RawMethod,
}

/// A linked service. Its method table never changes.
pub struct BoundService {
	name: QualifiedName,
	kind: ServiceKind,
	producer: Origin,
	instance: *mut c_void,
	methods: Box<[BoundMethod]>,
	rules: Arc<DispatchRules>,
}

// SAFETY: the instance pointer and method table are only ever passed back to
// the unit that produced them, whose functions `CodeUnit::new` requires to be
// callable from any thread. The table itself is immutable.
unsafe impl Send for BoundService {}
unsafe impl Sync for BoundService {}

impl std::fmt::Debug for BoundService {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.debug_struct( "BoundService" )
			.field( "name", &self.name )
			.field( "kind", &self.kind )
			.field( "producer", &self.producer )
			.field( "methods", &self.methods.len() )
			.finish_non_exhaustive()
	}
}

impl BoundService {

	/// Pairs a produced method table with the descriptor's methods.
	///
	/// # Safety
	/// `raw.methods` must point to `shape.methods.len()` valid entries, each
	/// holding the function pointer variant the matching method's streaming
	/// mode selects.
	pub(crate) unsafe fn bind(
		name: QualifiedName,
		shape: &ServiceShape,
		producer: Origin,
		raw: &RawService,
		rules: Arc<DispatchRules>,
	) -> Self {
		let table = match shape.methods.is_empty() {
			true => &[][..],
			false => std::slice::from_raw_parts( raw.methods, shape.methods.len() ),
		};
		let methods = shape.methods.iter().zip( table )
			.map(|( descriptor, raw )| BoundMethod { descriptor: descriptor.clone(), raw: *raw })
			.collect();
		Self { name, kind: shape.kind, producer, instance: raw.instance, methods, rules }
	}

	/// Name of the service type.
	#[inline] pub fn name( &self ) -> &QualifiedName { &self.name }

	/// Kind of the service type.
	#[inline] pub fn kind( &self ) -> ServiceKind { self.kind }

	/// Which provider produced this service, or the host.
	#[inline] pub fn producer( &self ) -> &Origin { &self.producer }

	/// Method descriptors in table order.
	pub fn methods( &self ) -> impl Iterator<Item = &MethodDescriptor> { self.methods.iter().map(| method | &method.descriptor )}

	/// Resolves a method name to its table index.
	pub fn method_index( &self, name: &str ) -> Option<MethodIndex> {
		self.methods.iter().position(| method | method.descriptor.name == name ).map( MethodIndex )
	}

	/// The descriptor of the method at `index`.
	pub fn method( &self, index: MethodIndex ) -> Option<&MethodDescriptor> {
		self.methods.get( index.0 ).map(| method | &method.descriptor )
	}

	/// Response capacity callers should allocate for the method at `index`.
	pub fn response_capacity( &self, index: MethodIndex ) -> usize {
		let default = self.rules.default_response_capacity ;
		self.method( index ).map_or( default, | method | method.response_capacity_or( default ))
	}

	/// Invokes a unary method, writing its response into `response`.
	/// Returns the number of bytes written.
	///
	/// # Errors
	/// Any [`CallError`]. On [`CallError::BufferTooSmall`] no response byte is usable.
	pub fn invoke_unary( &self, context: &CallContext<'_>, index: MethodIndex, request: &[u8], response: &mut [u8] ) -> Result<usize, CallError> {
		let method = self.admit( context, index, StreamingMode::None )?;
		if let Some( first ) = response.first_mut() { *first = 0 }
		// SAFETY: `admit` checked the method is unary, so `unary` is the valid variant.
		let status = unsafe { ( method.raw.unary )(
			self.instance,
			context,
			request.len(),
			request.as_ptr(),
			response.len(),
			response.as_mut_ptr(),
		)};
		CallError::check( status, response )
	}

	/// Invokes a unary method and borrows the written response.
	///
	/// # Errors
	/// See [`BoundService::invoke_unary`].
	pub fn call<'r>( &self, context: &CallContext<'_>, index: MethodIndex, request: &[u8], response: &'r mut [u8] ) -> Result<&'r [u8], CallError> {
		let written = self.invoke_unary( context, index, request, response )?;
		Ok( &response[ ..written ])
	}

	/// Invokes a server-streaming method, handing every item to `on_item`
	/// while it is valid. An error from `on_item` stops the stream and is
	/// returned.
	///
	/// # Errors
	/// Any [`CallError`] raised by admission, the producer or `on_item`.
	pub fn call_server_stream<F>( &self, context: &CallContext<'_>, index: MethodIndex, request: &[u8], on_item: F ) -> Result<(), CallError>
	where
		F: FnMut( &[u8] ) -> Result<(), CallError>,
	{
		let method = self.admit( context, index, StreamingMode::ServerStream )?;
		let mut error = vec![ 0u8; self.response_capacity( index )];
		let mut sink = ItemSink::new( on_item );
		let ( sink_ptr, emit ) = sink.as_raw();
		// SAFETY: `admit` checked the method streams from the server.
		let status = unsafe { ( method.raw.server_stream )(
			self.instance,
			context,
			request.len(),
			request.as_ptr(),
			sink_ptr,
			emit,
			error.len(),
			error.as_mut_ptr(),
		)};
		sink.finish( status, &error )
	}

	/// Invokes a client-streaming method, feeding it `items` in order.
	/// Returns the number of response bytes written.
	///
	/// # Errors
	/// Any [`CallError`].
	pub fn call_client_stream<I>( &self, context: &CallContext<'_>, index: MethodIndex, items: I, response: &mut [u8] ) -> Result<usize, CallError>
	where
		I: IntoIterator,
		I::Item: AsRef<[u8]>,
	{
		let method = self.admit( context, index, StreamingMode::ClientStream )?;
		if let Some( first ) = response.first_mut() { *first = 0 }
		let mut source = ItemSource::new( items.into_iter() );
		let ( source_ptr, next ) = source.as_raw();
		// SAFETY: `admit` checked the method streams from the client.
		let status = unsafe { ( method.raw.client_stream )(
			self.instance,
			context,
			source_ptr,
			next,
			response.len(),
			response.as_mut_ptr(),
		)};
		CallError::check( status, response )
	}

	fn admit( &self, context: &CallContext<'_>, index: MethodIndex, streaming: StreamingMode ) -> Result<&BoundMethod, CallError> {
		let method = self.methods.get( index.0 )
			.ok_or_else(|| CallError::NotFound( format!( "{} has no method #{}", self.name, index.0 )))?;
		let descriptor = &method.descriptor ;
		if descriptor.streaming != streaming {
			return Err( CallError::NotFound( format!(
				"{}.{} is {:?}, called as {:?}", self.name, descriptor.name, descriptor.streaming, streaming,
			)));
		}
		let caller = context.caller();
		let admitted = match ( self.kind, caller ) {
			( ServiceKind::Transaction, Caller::External | Caller::Module( _ )) => true,
			( ServiceKind::Query, Caller::Host | Caller::External ) => true,
			( ServiceKind::Query, Caller::Module( _ )) => descriptor.cross_module,
			( ServiceKind::Internal, Caller::Module( _ )) => true,
			( ServiceKind::Lifecycle, Caller::Host ) => true,
			_ => false,
		};
		if !admitted {
			debug!( service = %self.name, method = %descriptor.name, %caller, "call denied by admission rules" );
			return Err( CallError::PermissionDenied( format!(
				"{} may not call {} method {}.{}", caller, self.kind, self.name, descriptor.name,
			)));
		}
		if let Err( reason ) = self.rules.policy.authorize( &caller, &self.name, descriptor ) {
			debug!( service = %self.name, method = %descriptor.name, %caller, %reason, "call denied by policy" );
			return Err( CallError::PermissionDenied( reason ));
		}
		if context.depth() > self.rules.max_call_depth {
			return Err( CallError::ApplicationError( format!(
				"call depth {} exceeds the limit of {}", context.depth(), self.rules.max_call_depth,
			)));
		}
		Ok( method )
	}

}

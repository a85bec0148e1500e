//! The C-calling-convention surface shared by the host and every code unit.
//!
//! Nothing here allocates on behalf of the other side of the boundary. Every
//! buffer is allocated by the caller, handed over as pointer plus capacity,
//! and written by the callee, because the two sides may run on incompatible
//! allocators.
//!
//! Callbacks the host hands to a unit always take an opaque `host` pointer as
//! their first argument. The unit must pass back exactly the pointer it was
//! given alongside the callback.

use std::ffi::c_void ;

use crate::context::CallContext ;
use crate::client::RawClient ;



/// Status returned by entry points and callbacks. Zero is success.
pub type Status = i32 ;

/// Success status for entry points and callbacks.
pub const STATUS_OK: Status = 0 ;

/// Response capacity used when a method declares none of its own.
pub const DEFAULT_RESPONSE_CAPACITY: usize = 64 * 1024 ;

/// Size of the error buffer handed to every provider function.
pub const PROVIDER_ERROR_CAPACITY: usize = 64 * 1024 ;

/// Receives one compressed descriptor: `( host, size, bytes )`.
pub type DescriptorSink = unsafe extern "C" fn( host: *mut c_void, size: usize, bytes: *const u8 ) -> Status ;

/// Unit entry point delivering every descriptor the unit defines through `sink`.
pub type ReadDescriptorsFn = unsafe extern "C" fn( host: *mut c_void, sink: DescriptorSink ) -> Status ;

/// Receives one module: its encoded `ModuleInfo` and an array of provider
/// functions whose length equals the number of providers the info declares.
pub type RegisterModuleFn = unsafe extern "C" fn(
	host: *mut c_void,
	module_info_size: usize,
	module_info: *const u8,
	providers: *const Option<ProviderFn>,
) -> Status ;

/// Unit entry point registering every module the unit defines through `register`.
pub type RegisterModulesFn = unsafe extern "C" fn( host: *mut c_void, register: RegisterModuleFn ) -> Status ;

/// Receives one provider output. Must be called once per declared output, in order.
/// The table behind `output` only has to stay valid for the duration of the call.
pub type RegisterOutputFn = unsafe extern "C" fn( host: *mut c_void, output: *const RawService ) -> Status ;

/// A provider function.
///
/// `inputs` holds one pointer per declared input, in declared order; an absent
/// optional input is a null pointer. The client handles stay valid for the
/// lifetime of the linked runtime. Any bytes reported in `error` fail the link.
pub type ProviderFn = unsafe extern "C" fn(
	config_size: usize,
	config: *const u8,
	inputs: *const *const RawClient,
	host: *mut c_void,
	register_output: RegisterOutputFn,
	error: *mut RawBuffer,
) -> Status ;

/// Unary method. Returns the number of response bytes written, or a negative
/// [`CallError`]( crate::CallError ) code with a message written into `response`.
pub type UnaryFn = unsafe extern "C" fn(
	instance: *mut c_void,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	response_capacity: usize,
	response: *mut u8,
) -> i32 ;

/// Receives one streamed item. The item's bytes are only valid until this call returns.
/// A non-zero status asks the producer to stop.
pub type ItemSinkFn = unsafe extern "C" fn( sink: *mut c_void, size: usize, item: *const u8 ) -> Status ;

/// Pulls the next streamed item into `size`/`item`.
/// Returns `1` when an item was produced, `0` at the end of the stream and a
/// negative code on failure. The item stays valid until the next pull.
pub type ItemSourceFn = unsafe extern "C" fn( source: *mut c_void, size: *mut usize, item: *mut *const u8 ) -> i32 ;

/// Server-streaming method: one request in, items out through `emit`.
/// Returns zero on completion or a negative code with a message in `error`.
pub type ServerStreamFn = unsafe extern "C" fn(
	instance: *mut c_void,
	context: &CallContext<'_>,
	request_size: usize,
	request: *const u8,
	sink: *mut c_void,
	emit: ItemSinkFn,
	error_capacity: usize,
	error: *mut u8,
) -> i32 ;

/// Client-streaming method: items pulled through `next`, one response out.
pub type ClientStreamFn = unsafe extern "C" fn(
	instance: *mut c_void,
	context: &CallContext<'_>,
	source: *mut c_void,
	next: ItemSourceFn,
	response_capacity: usize,
	response: *mut u8,
) -> i32 ;

/// One entry of a method table. Which field is valid is decided by the
/// streaming mode of the method at the same index in the service descriptor.
#[repr( C )]
#[derive( Clone, Copy )]
pub union RawMethod {
	/// Valid for [`StreamingMode::None`]( crate::StreamingMode::None ).
	pub unary: UnaryFn,
	/// Valid for [`StreamingMode::ClientStream`]( crate::StreamingMode::ClientStream ).
	pub client_stream: ClientStreamFn,
	/// Valid for [`StreamingMode::ServerStream`]( crate::StreamingMode::ServerStream ).
	pub server_stream: ServerStreamFn,
}

impl RawMethod {
	/// Table entry for a unary method.
	pub const fn unary( func: UnaryFn ) -> Self { Self { unary: func }}
	/// Table entry for a client-streaming method.
	pub const fn client_stream( func: ClientStreamFn ) -> Self { Self { client_stream: func }}
	/// Table entry for a server-streaming method.
	pub const fn server_stream( func: ServerStreamFn ) -> Self { Self { server_stream: func }}
}

impl std::fmt::Debug for RawMethod {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.write_str( "RawMethod(<fn>)" )
	}
}

/// A service as produced by a provider: the provider's instance pointer and
/// its method table, in descriptor order.
#[repr( C )]
#[derive( Debug, Clone, Copy )]
pub struct RawService {
	/// Opaque state passed back as `instance` on every method call.
	pub instance: *mut c_void,
	/// Number of entries behind `methods`.
	pub method_count: usize,
	/// Method table, in the order of the service descriptor's methods.
	pub methods: *const RawMethod,
}

impl RawService {
	/// Describes a service backed by `instance` and the given method table.
	pub fn new( instance: *mut c_void, methods: &[RawMethod] ) -> Self {
		Self { instance, method_count: methods.len(), methods: methods.as_ptr() }
	}
}

/// A caller-allocated byte buffer the callee may write into, reporting how
/// much it wrote through `len`.
#[repr( C )]
#[derive( Debug )]
pub struct RawBuffer {
	/// Start of the buffer.
	pub ptr: *mut u8,
	/// Bytes available behind `ptr`.
	pub capacity: usize,
	/// Bytes written by the callee.
	pub len: usize,
}

impl RawBuffer {
	/// Wraps `storage` with nothing written yet.
	pub fn new( storage: &mut [u8] ) -> Self {
		Self { ptr: storage.as_mut_ptr(), capacity: storage.len(), len: 0 }
	}

	/// Copies `bytes` into the buffer, truncating at capacity.
	///
	/// # Safety
	/// `ptr` must be valid for writes of `capacity` bytes.
	pub unsafe fn write( &mut self, bytes: &[u8] ) {
		let len = bytes.len().min( self.capacity );
		std::ptr::copy_nonoverlapping( bytes.as_ptr(), self.ptr, len );
		self.len = len ;
	}

	/// The written prefix, lossily decoded.
	///
	/// # Safety
	/// `ptr` must be valid for reads of `capacity` bytes.
	pub(crate) unsafe fn written_message( &self ) -> String {
		let bytes = request_bytes( self.ptr, self.len.min( self.capacity ));
		String::from_utf8_lossy( bytes ).into_owned()
	}
}

/// Borrows a request handed across the boundary.
///
/// # Safety
/// Unless `ptr` is null or `len` is zero, `ptr` must be valid for reads of
/// `len` bytes for the chosen lifetime.
pub unsafe fn request_bytes<'a>( ptr: *const u8, len: usize ) -> &'a [u8] {
	match ptr.is_null() || len == 0 {
		true => &[],
		false => std::slice::from_raw_parts( ptr, len ),
	}
}

/// Borrows a caller-allocated response buffer handed across the boundary.
///
/// # Safety
/// Unless `ptr` is null or `capacity` is zero, `ptr` must be valid for writes
/// of `capacity` bytes for the chosen lifetime and not aliased.
pub unsafe fn response_buffer<'a>( ptr: *mut u8, capacity: usize ) -> &'a mut [u8] {
	match ptr.is_null() || capacity == 0 {
		true => &mut [],
		false => std::slice::from_raw_parts_mut( ptr, capacity ),
	}
}

/// Writes an encoded response into a caller-allocated buffer following the
/// unary contract: the byte count on success, `BufferTooSmall` otherwise.
pub fn write_response( response: &mut [u8], bytes: &[u8] ) -> i32 {
	match response.get_mut( ..bytes.len() ) {
		Some( target ) if i32::try_from( bytes.len() ).is_ok() => {
			target.copy_from_slice( bytes );
			// Guarded by the `try_from` above.
			#[allow( clippy::cast_possible_truncation, clippy::cast_possible_wrap )]
			let written = bytes.len() as i32 ;
			written
		},
		_ => crate::CallError::BufferTooSmall( format!(
			"response needs {} bytes, capacity is {}", bytes.len(), response.len(),
		)).write_into( response ),
	}
}

#[cfg( test )]
mod tests {
	use super::* ;
	use crate::CallError ;

	#[test]
	fn write_response_fits() {
		let mut buffer = [ 0u8; 8 ];
		assert_eq!( write_response( &mut buffer, b"abc" ), 3 );
		assert_eq!( &buffer[ ..3 ], b"abc" );
	}

	#[test]
	fn write_response_too_large() {
		let mut buffer = [ 0u8; 2 ];
		assert_eq!( write_response( &mut buffer, b"abc" ), CallError::BUFFER_TOO_SMALL );
	}

	#[test]
	fn null_request_is_empty() {
		assert!( unsafe { request_bytes( std::ptr::null(), 12 ) }.is_empty() );
	}
}

//! A loader and linker for foreign modules of a deterministic state-machine runtime.
//!
//! Modules are compiled independently, possibly from different source
//! languages, into **code units** that talk to the host only through a
//! C-calling-convention boundary. `module_link` takes a set of such units from
//! "loaded" to "ready to serve calls":
//!
//! 1. **Descriptor exchange**: every unit hands over the schema descriptors of
//! 	the messages and services it defines. Same name means same shape, or
//! 	nothing links.
//! 2. **Registration**: every unit registers its modules. A module is a
//! 	configuration key plus providers; a provider declares the inputs it
//! 	consumes and the outputs it produces.
//! 3. **Resolution**: one global provider order is computed so that every input
//! 	is produced before it is consumed. Independent replicas resolving the
//! 	same registrations agree on the order bit for bit.
//! 4. **Linking**: providers run in that order and register their outputs as
//! 	method tables, which become immutable [`BoundService`]s.
//!
//! After linking, the [`Runtime`] is the only thing left and calls go through
//! the dispatch boundary: the caller allocates every buffer, the callee writes
//! into it and returns either a byte count or a negative [`CallError`] code.
//!
//! # Core Concepts
//!
//! - [`CodeUnit`]: the two entry points of a loaded unit. How it was loaded is up to the embedder.
//!
//! - [`Descriptor`]: a named, versioned message or service shape. Service shapes carry a
//! 	[`ServiceKind`] that decides who may call them:
//! 	- `Transaction`: external transactions and other modules, unary only
//! 	- `Query`: read paths, and other modules for methods marked cross-module, unary only
//! 	- `Internal`: other modules only; the callee sees the caller's identity
//! 	- `Lifecycle`: the host only, one per module
//!
//! - [`ModuleInfo`] / [`ProviderInfo`]: what a module registers. Inputs have a
//! 	[`cardinality::Cardinality`] derived from their kind and optionality:
//! 	- required service: exactly one producer
//! 	- optional service: zero or one producer
//! 	- required listener: one or more producers
//! 	- optional listener: any number of producers
//!
//! - [`CallContext`]: the call-scoped handle carrying the caller's identity and ambient state.
//!
//! - [`RawClient`]: how a provider reaches its inputs. Calls made through it are
//! 	attributed to the consuming module by the host.
//!
//! # Example
//!
//! A unit written in Rust that defines one query service:
//!
//! ```
//! use std::ffi::c_void ;
//! use module_link::abi::{
//! 	request_bytes, response_buffer, write_response,
//! 	DescriptorSink, ProviderFn, RawBuffer, RawMethod, RawService,
//! 	RegisterModuleFn, RegisterOutputFn, Status,
//! };
//! use module_link::{
//! 	CallContext, Caller, CodeUnit, Descriptor, Host, HostConfig, MethodDescriptor,
//! 	ModuleInfo, OutputSpec, ProviderInfo, RawClient, ServiceKind,
//! };
//!
//! unsafe extern "C" fn read_descriptors( host: *mut c_void, sink: DescriptorSink ) -> Status {
//! 	let descriptor = Descriptor::service( "greeter.Query", ServiceKind::Query, [
//! 		MethodDescriptor::unary( "Greet", "greeter.Name", "greeter.Greeting" ),
//! 	]);
//! 	let Ok( bytes ) = descriptor.encode() else { return -1 };
//! 	sink( host, bytes.len(), bytes.as_ptr() )
//! }
//!
//! unsafe extern "C" fn greet(
//! 	_: *mut c_void, _: &CallContext<'_>,
//! 	request_size: usize, request: *const u8,
//! 	response_capacity: usize, response: *mut u8,
//! ) -> i32 {
//! 	let name = request_bytes( request, request_size );
//! 	write_response( response_buffer( response, response_capacity ), &[ &b"hello "[ .. ], name ].concat() )
//! }
//!
//! static METHODS: [RawMethod; 1] = [ RawMethod::unary( greet )];
//!
//! unsafe extern "C" fn provide(
//! 	_: usize, _: *const u8, _: *const *const RawClient,
//! 	host: *mut c_void, register_output: RegisterOutputFn, _: *mut RawBuffer,
//! ) -> Status {
//! 	register_output( host, &RawService::new( std::ptr::null_mut(), &METHODS ))
//! }
//!
//! unsafe extern "C" fn register_modules( host: *mut c_void, register: RegisterModuleFn ) -> Status {
//! 	let info = ModuleInfo::new( "greeter", [ ProviderInfo::new([], [ OutputSpec::service( "greeter.Query" )])]);
//! 	let Ok( bytes ) = info.encode() else { return -1 };
//! 	let providers = [ Some( provide as ProviderFn )];
//! 	register( host, bytes.len(), bytes.as_ptr(), providers.as_ptr() )
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let unit = unsafe { CodeUnit::new( "greeter", read_descriptors, register_modules )};
//! let runtime = Host::new( HostConfig::default() ).load( unit )?.link()?;
//!
//! let context = CallContext::new( Caller::External );
//! let response = runtime.call_owned( "greeter.Query", &context, "Greet", b"world" )?;
//! assert_eq!( response, b"hello world" );
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! The crate logs through [`tracing`](https://docs.rs/tracing) and never
//! installs a subscriber. Loading and linking log at `info`, individual
//! registrations and denied calls at `debug`.

pub mod abi ;
pub mod cardinality ;
mod call_error ;
mod client ;
mod config ;
mod context ;
mod descriptor ;
mod error ;
mod host ;
mod linker ;
mod module_info ;
mod name ;
mod policy ;
mod registry ;
mod resolver ;
mod runtime ;
mod service ;
mod stream ;
mod unit ;

#[doc( no_inline )]
pub use nonempty_collections::NEVec ;

pub use call_error::CallError ;
pub use client::{ RawClient, ClientUnaryFn, ClientServerStreamFn, ClientClientStreamFn };
pub use config::{ HostConfig, ConfigValue, ConfigError };
pub use context::{ CallContext, Caller, CallerKind };
pub use descriptor::{
	Descriptor, DescriptorCatalogue, DescriptorError, FieldDescriptor, MessageShape,
	MethodDescriptor, ServiceKind, ServiceShape, Shape, StreamingMode, MAX_DESCRIPTOR_SIZE,
};
pub use error::{ LinkError, LoadPhase };
pub use host::Host ;
pub use module_info::{ InputSpec, Kind, ModuleInfo, OutputSpec, ProviderInfo };
pub use name::QualifiedName ;
pub use policy::{ AllowAll, CallPolicy };
pub use registry::{ Origin, ProviderRef };
pub use runtime::Runtime ;
pub use service::{ BoundService, MethodIndex };
pub use stream::{ ItemReader, ItemWriter };
pub use unit::CodeUnit ;

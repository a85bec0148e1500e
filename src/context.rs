//! Call-scoped context handed to every method invocation.

use std::ffi::c_void ;
use std::marker::PhantomData ;



/// Who issued a call.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Caller<'a> {
	/// The host runtime itself (lifecycle hooks, read paths).
	Host,
	/// An external transaction routed in by the host.
	External,
	/// Another module, identified by its configuration key.
	Module( &'a str ),
}

impl Caller<'_> {
	/// The calling module's identity, if the caller is a module.
	pub fn module( &self ) -> Option<&str> { match self {
		Self::Module( module ) => Some( module ),
		Self::Host | Self::External => None,
	}}
}

impl std::fmt::Display for Caller<'_> {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { match self {
		Self::Host => write!( f, "host" ),
		Self::External => write!( f, "external" ),
		Self::Module( module ) => write!( f, "module '{}'", module ),
	}}
}

/// Discriminant of [`Caller`] as laid out in [`CallContext`].
#[repr( u32 )]
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum CallerKind {
	/// See [`Caller::Host`].
	Host = 0,
	/// See [`Caller::External`].
	External = 1,
	/// See [`Caller::Module`]; the identity follows in `caller` / `caller_len`.
	Module = 2,
}

/// The call-scoped handle passed to every method.
///
/// Carries the caller's identity, an opaque pointer to ambient execution
/// state (for instance the state view of the current transaction) and the
/// nesting depth of the call chain. It is only valid while the call it was
/// created for is running; callees must not retain it.
///
/// Foreign units read the fields directly through the `#[repr( C )]` layout.
#[repr( C )]
#[derive( Debug )]
pub struct CallContext<'a> {
	caller_kind: CallerKind,
	caller: *const u8,
	caller_len: usize,
	ambient: *mut c_void,
	depth: u32,
	_scope: PhantomData<&'a str>,
}

impl<'a> CallContext<'a> {

	/// A root context for a call issued by `caller`, with no ambient state.
	pub fn new( caller: Caller<'a> ) -> Self {
		let ( caller_kind, name ) = match caller {
			Caller::Host => ( CallerKind::Host, "" ),
			Caller::External => ( CallerKind::External, "" ),
			Caller::Module( module ) => ( CallerKind::Module, module ),
		};
		Self {
			caller_kind,
			caller: name.as_ptr(),
			caller_len: name.len(),
			ambient: std::ptr::null_mut(),
			depth: 0,
			_scope: PhantomData,
		}
	}

	/// Attaches an opaque pointer to ambient execution state.
	pub fn with_ambient( mut self, ambient: *mut c_void ) -> Self {
		self.ambient = ambient ;
		self
	}

	/// The caller of the current call.
	pub fn caller( &self ) -> Caller<'_> { match self.caller_kind {
		CallerKind::Host => Caller::Host,
		CallerKind::External => Caller::External,
		// SAFETY: `caller` and `caller_len` were taken from a `&'a str` that outlives `self`.
		CallerKind::Module => Caller::Module( unsafe {
			std::str::from_utf8_unchecked( std::slice::from_raw_parts( self.caller, self.caller_len ))
		}),
	}}

	/// The opaque ambient state pointer; null when none was attached.
	#[inline] pub fn ambient( &self ) -> *mut c_void { self.ambient }

	/// How many calls deep this call is; zero for calls issued by the host.
	#[inline] pub fn depth( &self ) -> u32 { self.depth }

	/// The context for a call `module` makes while handling this one.
	/// Ambient state is inherited; depth grows by one.
	pub(crate) fn nested<'b>( &'b self, module: &'b str ) -> CallContext<'b> {
		CallContext {
			depth: self.depth.saturating_add( 1 ),
			ambient: self.ambient,
			..CallContext::new( Caller::Module( module ))
		}
	}

}

#[cfg( test )]
mod tests {
	use super::* ;

	#[test]
	fn nested_context_reports_module_and_depth() {
		let mut state = 7u32 ;
		let root = CallContext::new( Caller::External ).with_ambient(( &mut state as *mut u32 ).cast());
		let nested = root.nested( "bank" );
		assert_eq!( nested.caller(), Caller::Module( "bank" ));
		assert_eq!( nested.depth(), 1 );
		assert_eq!( nested.ambient(), root.ambient() );
	}
}

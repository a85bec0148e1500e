//! The seam through which external permission logic vets calls.

use crate::context::Caller ;
use crate::descriptor::MethodDescriptor ;
use crate::name::QualifiedName ;



/// Decides whether a caller may invoke a method, after the built-in
/// admission rules of the service's kind have passed.
///
/// Implementations see the caller identity the host established, never one
/// the caller claims. A rejection reason becomes the message of a
/// [`CallError::PermissionDenied`]( crate::CallError::PermissionDenied ).
///
/// Closures with the same signature implement the trait.
pub trait CallPolicy: Send + Sync {
	/// Returns `Err( reason )` to reject the call.
	///
	/// # Errors
	/// The reason the caller may not invoke `method` of `service`.
	fn authorize( &self, caller: &Caller<'_>, service: &QualifiedName, method: &MethodDescriptor ) -> Result<(), String> ;
}

/// Admits every call the admission rules admit.
#[derive( Debug, Default, Clone, Copy )]
pub struct AllowAll ;

impl CallPolicy for AllowAll {
	fn authorize( &self, _: &Caller<'_>, _: &QualifiedName, _: &MethodDescriptor ) -> Result<(), String> { Ok(()) }
}

impl<F> CallPolicy for F
where
	F: Fn( &Caller<'_>, &QualifiedName, &MethodDescriptor ) -> Result<(), String> + Send + Sync,
{
	fn authorize( &self, caller: &Caller<'_>, service: &QualifiedName, method: &MethodDescriptor ) -> Result<(), String> {
		self( caller, service, method )
	}
}

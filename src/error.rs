use itertools::Itertools ;
use nonempty_collections::NEVec ;
use thiserror::Error ;

use crate::abi::Status ;
use crate::module_info::Kind ;
use crate::name::QualifiedName ;
use crate::registry::{ Origin, ProviderRef };



/// The unit entry point that was running when a unit failed.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum LoadPhase {
	/// The descriptor read entry point.
	Descriptors,
	/// The module registration entry point.
	Registration,
}

impl std::fmt::Display for LoadPhase {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { match self {
		Self::Descriptors => write!( f, "descriptor exchange" ),
		Self::Registration => write!( f, "module registration" ),
	}}
}

/// Errors that can occur while loading, resolving and linking modules.
///
/// All of them are fatal: a host that hits one never produces a runtime, so
/// a partially linked graph is never exposed to callers. Every variant names
/// the unit, module, provider or kind at fault.
#[derive( Debug, Error )]
pub enum LinkError {

	/// A unit entry point returned a non-zero status.
	#[error( "Unit '{unit}' failed during {phase} with status {status}" )]
	UnitFailed { unit: String, phase: LoadPhase, status: Status },

	/// A unit delivered descriptor bytes that could not be decoded or are invalid.
	#[error( "Malformed descriptor from unit '{unit}': {reason}" )]
	MalformedDescriptor { unit: String, reason: String },

	/// Two descriptors share a name but not a shape.
	#[error( "Descriptor conflict: '{0}' is declared with different shapes" )]
	DescriptorConflict( QualifiedName ),

	/// A unit registered a module whose declaration or provider array is unusable.
	#[error( "Malformed module from unit '{unit}': {reason}" )]
	MalformedModuleInfo { unit: String, reason: String },

	/// Two modules declare the same configuration key.
	#[error( "Duplicate module: '{0}'" )]
	DuplicateModule( QualifiedName ),

	/// An input or output names a kind with no service descriptor behind it.
	#[error( "Undeclared {kind} referenced by {origin}" )]
	UndeclaredKind { kind: Kind, origin: Origin },

	/// A required input has no producer and no host-supplied value.
	#[error( "Missing input: {kind} required by '{consumer}'" )]
	MissingInput { kind: Kind, consumer: ProviderRef },

	/// A service type has more than one producer.
	#[error( "Duplicate output: {kind} produced by {}", join( .producers ))]
	DuplicateOutput { kind: Kind, producers: NEVec<Origin> },

	/// No order satisfies the listed providers' inputs.
	#[error( "Cyclic dependency between providers: {}", join( .0 ))]
	CyclicDependency( NEVec<ProviderRef> ),

	/// A module produces more than one lifecycle service.
	#[error( "Module '{0}' produces more than one lifecycle service" )]
	DuplicateLifecycle( QualifiedName ),

	/// A provider called `register_output` a different number of times than it declared outputs.
	#[error( "Provider '{provider}' registered {actual} outputs but declares {expected}" )]
	OutputArity { provider: ProviderRef, expected: usize, actual: usize },

	/// An output's method table does not match its service descriptor.
	#[error( "{origin} produced {kind} with {actual} methods, its descriptor declares {expected}" )]
	OutputShape { origin: Origin, kind: Kind, expected: usize, actual: usize },

	/// A provider returned a non-zero status or reported an error.
	#[error( "Provider '{provider}' failed with status {status}: {message}" )]
	ProviderInit { provider: ProviderRef, status: Status, message: String },

}

fn join<T: std::fmt::Display + Clone>( items: &NEVec<T> ) -> String {
	items.clone().into_iter().map(| item | format!( "'{}'", item )).join( ", " )
}

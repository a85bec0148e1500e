use crate::abi::{ ReadDescriptorsFn, RegisterModulesFn };



/// A loaded code unit, reduced to the two entry points the host calls statically.
///
/// Everything else a unit exposes is reached through the function pointers it
/// registers. How the unit was loaded (statically linked, `dlopen`ed, generated
/// by another toolchain) is the embedding host's business. The host keeps
/// every unit for the lifetime of the linked runtime; units are never unloaded.
#[derive( Clone )]
pub struct CodeUnit {
	name: String,
	read_descriptors: ReadDescriptorsFn,
	register_modules: RegisterModulesFn,
}

impl CodeUnit {

	/// Wraps a unit's entry points. `name` is used in diagnostics only.
	///
	/// # Safety
	/// Both entry points, and every function pointer they hand to the host,
	/// must follow the module ABI and stay callable for as long as the linked
	/// runtime exists. Provider and method functions may be called from any
	/// thread once linking is done.
	pub unsafe fn new(
		name: impl Into<String>,
		read_descriptors: ReadDescriptorsFn,
		register_modules: RegisterModulesFn,
	) -> Self {
		Self { name: name.into(), read_descriptors, register_modules }
	}

	/// Diagnostic name of the unit.
	#[inline] pub fn name( &self ) -> &str { &self.name }

	#[inline] pub(crate) fn read_descriptors( &self ) -> ReadDescriptorsFn { self.read_descriptors }

	#[inline] pub(crate) fn register_modules( &self ) -> RegisterModulesFn { self.register_modules }

}

impl std::fmt::Debug for CodeUnit {
	fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
		f.debug_struct( "CodeUnit" )
			.field( "name", &self.name )
			.finish_non_exhaustive()
	}
}

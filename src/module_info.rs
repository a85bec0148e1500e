//! Module and provider declarations sent by units during registration.

use serde::{ Deserialize, Serialize };

use crate::name::QualifiedName ;



/// What an input consumes or an output produces.
#[derive( Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize )]
pub enum Kind {
	/// A service type, produced by exactly one provider.
	Service( QualifiedName ),
	/// An event-listener type; any number of providers may produce listeners of it.
	EventListener( QualifiedName ),
}

impl Kind {
	/// The service descriptor name this kind refers to.
	pub fn name( &self ) -> &QualifiedName { match self {
		Self::Service( name ) | Self::EventListener( name ) => name,
	}}

	/// Whether this is an event-listener kind.
	pub fn is_listener( &self ) -> bool { matches!( self, Self::EventListener( _ ))}
}

impl std::fmt::Display for Kind {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { match self {
		Self::Service( name ) => write!( f, "service {}", name ),
		Self::EventListener( name ) => write!( f, "listener {}", name ),
	}}
}

/// One input a provider consumes.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct InputSpec {
	pub kind: Kind,
	/// An optional input may be absent; the provider then receives a null client.
	pub optional: bool,
}

impl InputSpec {
	/// A required service input.
	pub fn service( name: impl Into<QualifiedName> ) -> Self {
		Self { kind: Kind::Service( name.into() ), optional: false }
	}

	/// A required event-listener input.
	pub fn listener( name: impl Into<QualifiedName> ) -> Self {
		Self { kind: Kind::EventListener( name.into() ), optional: false }
	}

	/// Makes the input optional.
	pub fn optional( mut self ) -> Self { self.optional = true ; self }
}

/// One output a provider produces.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct OutputSpec {
	pub kind: Kind,
}

impl OutputSpec {
	/// A service output.
	pub fn service( name: impl Into<QualifiedName> ) -> Self { Self { kind: Kind::Service( name.into() )}}

	/// An event-listener output.
	pub fn listener( name: impl Into<QualifiedName> ) -> Self { Self { kind: Kind::EventListener( name.into() )}}
}

/// Declares, in fixed order, every input a provider consumes and every output it produces.
#[derive( Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize )]
pub struct ProviderInfo {
	pub inputs: Vec<InputSpec>,
	pub outputs: Vec<OutputSpec>,
}

impl ProviderInfo {
	/// A provider declaration.
	pub fn new( inputs: impl IntoIterator<Item = InputSpec>, outputs: impl IntoIterator<Item = OutputSpec> ) -> Self {
		Self { inputs: inputs.into_iter().collect(), outputs: outputs.into_iter().collect() }
	}
}

/// One module: its configuration key and its providers.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct ModuleInfo {
	/// Key under which the host configuration holds this module's config; also its identity.
	pub config_type: QualifiedName,
	pub providers: Vec<ProviderInfo>,
}

impl ModuleInfo {

	/// A module declaration.
	pub fn new( config_type: impl Into<QualifiedName>, providers: impl IntoIterator<Item = ProviderInfo> ) -> Self {
		Self { config_type: config_type.into(), providers: providers.into_iter().collect() }
	}

	/// Encodes the declaration for registration.
	///
	/// # Errors
	/// Fails if the declaration cannot be serialized.
	pub fn encode( &self ) -> Result<Vec<u8>, bincode::Error> { bincode::serialize( self )}

	/// Decodes a registered declaration.
	///
	/// # Errors
	/// Fails if the bytes are not a valid declaration.
	pub fn decode( bytes: &[u8] ) -> Result<Self, bincode::Error> { bincode::deserialize( bytes )}

}

#[cfg( test )]
mod tests {
	use super::* ;

	#[test]
	fn decode_rejects_truncated_bytes() {
		let info = ModuleInfo::new( "bank", [ ProviderInfo::new(
			[ InputSpec::service( "auth.Query" ).optional() ],
			[ OutputSpec::service( "bank.Msg" )],
		)]);
		let bytes = info.encode().expect( "encode" );
		assert_eq!( ModuleInfo::decode( &bytes ).expect( "decode" ), info );
		assert!( ModuleInfo::decode( &bytes[ ..bytes.len() / 2 ]).is_err() );
	}
}

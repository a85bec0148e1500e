//! Schema descriptors and the exchange that merges them into one catalogue.
//!
//! Before any module is registered, every code unit hands the host the
//! descriptors of the messages and services it defines. Descriptors travel
//! `bincode`-encoded and LZ4-compressed. The host merges them by name: the
//! same name delivered twice must describe the same shape, otherwise linking
//! cannot proceed.

use std::collections::BTreeMap ;
use std::ffi::c_void ;
use serde::{ Deserialize, Serialize };
use thiserror::Error ;
use tracing::debug ;

use crate::abi::{ request_bytes, Status, STATUS_OK };
use crate::error::LinkError ;
use crate::name::QualifiedName ;



/// Largest decompressed descriptor the host accepts.
pub const MAX_DESCRIPTOR_SIZE: usize = 16 * 1024 * 1024 ;

/// A named, versioned schema definition.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct Descriptor {
	/// Fully-qualified name; the merge key.
	pub name: QualifiedName,
	/// Schema version; part of the shape for compatibility purposes.
	pub version: u32,
	/// The described shape.
	pub shape: Shape,
}

/// What a [`Descriptor`] describes.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub enum Shape {
	/// A message type.
	Message( MessageShape ),
	/// A service type: an ordered list of methods.
	Service( ServiceShape ),
}

/// Fields of a message type.
#[derive( Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize )]
pub struct MessageShape {
	/// Fields in declaration order.
	pub fields: Vec<FieldDescriptor>,
}

/// One field of a message type.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct FieldDescriptor {
	/// Field name.
	pub name: String,
	/// Wire field number.
	pub number: u32,
	/// Qualified name of the field's type.
	pub type_name: QualifiedName,
	/// Whether the field holds a sequence of values.
	pub repeated: bool,
}

/// The kind of a service, which decides who may call it and how.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize )]
pub enum ServiceKind {
	/// Called by external transactions and other modules; mutates state; unary only.
	Transaction,
	/// Called by read paths and, for methods marked cross-module, other modules; unary only.
	Query,
	/// Called by other modules only; caller identity is exposed for authorization.
	Internal,
	/// Genesis / begin-block / end-block hooks, called by the host only.
	Lifecycle,
}

impl ServiceKind {
	/// Whether methods of this kind may stream.
	pub fn allows_streaming( self ) -> bool {
		matches!( self, Self::Internal | Self::Lifecycle )
	}
}

impl std::fmt::Display for ServiceKind {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { write!( f, "{:?}", self )}
}

/// Streaming shape of a method. Bidirectional streaming does not exist.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize )]
pub enum StreamingMode {
	/// One request, one response.
	#[default] None,
	/// Many requests, one response.
	ClientStream,
	/// One request, many responses.
	ServerStream,
}

/// The shape of a service type: its kind and ordered methods.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct ServiceShape {
	/// Who may call the service.
	pub kind: ServiceKind,
	/// Methods, in method-table order.
	pub methods: Vec<MethodDescriptor>,
}

/// One method of a service type.
#[derive( Debug, Clone, PartialEq, Eq, Serialize, Deserialize )]
pub struct MethodDescriptor {
	/// Method name, unique within its service.
	pub name: String,
	/// Qualified name of the request message.
	pub request: QualifiedName,
	/// Qualified name of the response message.
	pub response: QualifiedName,
	/// Streaming shape.
	pub streaming: StreamingMode,
	/// For query methods: whether other modules may call it.
	pub cross_module: bool,
	/// Response capacity the caller should allocate, if not the default.
	pub response_capacity: Option<u32>,
}

impl MethodDescriptor {

	/// A unary method.
	pub fn unary( name: impl Into<String>, request: impl Into<QualifiedName>, response: impl Into<QualifiedName> ) -> Self {
		Self {
			name: name.into(),
			request: request.into(),
			response: response.into(),
			streaming: StreamingMode::None,
			cross_module: false,
			response_capacity: None,
		}
	}

	/// Makes the method client-streaming.
	pub fn client_streaming( mut self ) -> Self { self.streaming = StreamingMode::ClientStream ; self }

	/// Makes the method server-streaming.
	pub fn server_streaming( mut self ) -> Self { self.streaming = StreamingMode::ServerStream ; self }

	/// Marks a query method callable from other modules.
	pub fn cross_module( mut self ) -> Self { self.cross_module = true ; self }

	/// Declares the response capacity callers should allocate.
	pub fn with_response_capacity( mut self, capacity: u32 ) -> Self { self.response_capacity = Some( capacity ); self }

	/// Response capacity for this method, falling back to `default`.
	pub fn response_capacity_or( &self, default: usize ) -> usize {
		self.response_capacity.map_or( default, | capacity | capacity as usize )
	}

}

/// Errors encoding or decoding a descriptor.
#[derive( Debug, Error )]
pub enum DescriptorError {
	/// The bytes are not a valid LZ4 block.
	#[error( "Decompression failed: {0}" )] Decompression( #[from] lz4_flex::block::DecompressError ),
	/// The decompressed bytes are not a valid descriptor.
	#[error( "Encoding error: {0}" )] Encoding( #[from] bincode::Error ),
	/// The declared decompressed size is above [`MAX_DESCRIPTOR_SIZE`].
	#[error( "Descriptor too large: {0} bytes" )] TooLarge( usize ),
	/// The descriptor decoded but is not usable.
	#[error( "Invalid descriptor '{0}': {1}" )] Invalid( QualifiedName, String ),
}

impl Descriptor {

	/// A message descriptor.
	pub fn message( name: impl Into<QualifiedName>, fields: impl IntoIterator<Item = FieldDescriptor> ) -> Self {
		Self { name: name.into(), version: 1, shape: Shape::Message( MessageShape { fields: fields.into_iter().collect() })}
	}

	/// A service descriptor.
	pub fn service( name: impl Into<QualifiedName>, kind: ServiceKind, methods: impl IntoIterator<Item = MethodDescriptor> ) -> Self {
		Self { name: name.into(), version: 1, shape: Shape::Service( ServiceShape { kind, methods: methods.into_iter().collect() })}
	}

	/// Sets the schema version.
	pub fn with_version( mut self, version: u32 ) -> Self { self.version = version ; self }

	/// The service shape, if this describes a service.
	pub fn as_service( &self ) -> Option<&ServiceShape> { match &self.shape {
		Shape::Service( service ) => Some( service ),
		Shape::Message( _ ) => None,
	}}

	/// Encodes and compresses the descriptor for delivery across the boundary.
	///
	/// # Errors
	/// Fails if the descriptor cannot be serialized.
	pub fn encode( &self ) -> Result<Vec<u8>, DescriptorError> {
		Ok( lz4_flex::compress_prepend_size( &bincode::serialize( self )? ))
	}

	/// Decompresses and decodes a delivered descriptor, then checks it is usable.
	///
	/// # Errors
	/// Fails on corrupt bytes, an oversized payload or an invalid descriptor.
	pub fn decode( bytes: &[u8] ) -> Result<Self, DescriptorError> {
		let declared = bytes.get( ..4 )
			.and_then(| prefix | <[u8; 4]>::try_from( prefix ).ok() )
			.map_or( 0, | prefix | u32::from_le_bytes( prefix ) as usize );
		if declared > MAX_DESCRIPTOR_SIZE { return Err( DescriptorError::TooLarge( declared )) }
		let descriptor: Self = bincode::deserialize( &lz4_flex::decompress_size_prepended( bytes )? )?;
		descriptor.validate()?;
		Ok( descriptor )
	}

	fn validate( &self ) -> Result<(), DescriptorError> {
		let invalid = | reason: String | Err( DescriptorError::Invalid( self.name.clone(), reason ));
		if !self.name.is_well_formed() { return invalid( "malformed name".to_string() ) }
		let Shape::Service( service ) = &self.shape else { return Ok(()) };
		let mut seen = std::collections::BTreeSet::new();
		for method in &service.methods {
			if method.name.is_empty() { return invalid( "method with empty name".to_string() ) }
			if !seen.insert( method.name.as_str() ) {
				return invalid( format!( "method '{}' declared twice", method.name ));
			}
			if method.streaming != StreamingMode::None && !service.kind.allows_streaming() {
				return invalid( format!( "{} method '{}' cannot stream", service.kind, method.name ));
			}
			match method.response_capacity {
				Some( 0 ) => return invalid( format!( "method '{}' declares an empty response buffer", method.name )),
				Some( capacity ) if i32::try_from( capacity ).is_err() =>
					return invalid( format!( "method '{}' declares a response buffer of {} bytes", method.name, capacity )),
				_ => {},
			}
		}
		Ok(())
	}

}

/// The merged, name-keyed catalogue of every descriptor delivered so far.
#[derive( Debug, Clone, Default )]
pub struct DescriptorCatalogue {
	entries: BTreeMap<QualifiedName, Descriptor>,
}

impl DescriptorCatalogue {

	/// An empty catalogue.
	pub fn new() -> Self { Self::default() }

	/// Merges a descriptor. Re-delivering an identical descriptor is a no-op.
	///
	/// # Errors
	/// Returns [`LinkError::DescriptorConflict`] if a different shape (or
	/// version) is already registered under the same name.
	pub fn merge( &mut self, descriptor: Descriptor ) -> Result<(), LinkError> {
		match self.entries.get( &descriptor.name ) {
			Some( existing ) if *existing == descriptor => Ok(()),
			Some( _ ) => Err( LinkError::DescriptorConflict( descriptor.name )),
			None => {
				debug!( descriptor = %descriptor.name, version = descriptor.version, "merged descriptor" );
				self.entries.insert( descriptor.name.clone(), descriptor );
				Ok(())
			}
		}
	}

	/// Looks a descriptor up by name.
	pub fn get( &self, name: &str ) -> Option<&Descriptor> { self.entries.get( name ) }

	/// Looks a service shape up by name.
	pub fn service( &self, name: &str ) -> Option<&ServiceShape> {
		self.get( name ).and_then( Descriptor::as_service )
	}

	/// Number of distinct descriptors.
	pub fn len( &self ) -> usize { self.entries.len() }

	/// Whether no descriptor has been merged yet.
	pub fn is_empty( &self ) -> bool { self.entries.is_empty() }

	/// All descriptors, ordered by name.
	pub fn iter( &self ) -> impl Iterator<Item = &Descriptor> { self.entries.values() }

}

/// Host state threaded through a unit's descriptor callback.
pub(crate) struct DescriptorExchange<'a> {
	pub unit: &'a str,
	pub received: Vec<Descriptor>,
	pub failure: Option<LinkError>,
}

impl<'a> DescriptorExchange<'a> {
	pub fn new( unit: &'a str ) -> Self {
		Self { unit, received: Vec::new(), failure: None }
	}
}

/// [`DescriptorSink`]( crate::abi::DescriptorSink ) handed to units.
pub(crate) unsafe extern "C" fn receive_descriptor( host: *mut c_void, size: usize, bytes: *const u8 ) -> Status {
	// SAFETY: `host` is the `DescriptorExchange` passed alongside this callback.
	let Some( exchange ) = host.cast::<DescriptorExchange<'_>>().as_mut() else { return -1 };
	if exchange.failure.is_some() { return -1 }
	match Descriptor::decode( request_bytes( bytes, size )) {
		Ok( descriptor ) => {
			exchange.received.push( descriptor );
			STATUS_OK
		},
		Err( err ) => {
			exchange.failure = Some( LinkError::MalformedDescriptor {
				unit: exchange.unit.to_string(),
				reason: err.to_string(),
			});
			-1
		}
	}
}

#[cfg( test )]
mod tests {
	use super::* ;

	fn bank() -> Descriptor {
		Descriptor::service( "bank.Msg", ServiceKind::Transaction, [
			MethodDescriptor::unary( "Send", "bank.MsgSend", "bank.MsgSendResponse" ),
		])
	}

	#[test]
	fn encode_decode_preserves_descriptor() {
		let descriptor = bank();
		let bytes = descriptor.encode().expect( "encode" );
		assert_eq!( Descriptor::decode( &bytes ).expect( "decode" ), descriptor );
	}

	#[test]
	fn corrupt_bytes_rejected() {
		assert!( Descriptor::decode( &[ 3, 0, 0, 0, 0xff ]).is_err() );
	}

	#[test]
	fn oversized_declaration_rejected_before_decompression() {
		let bytes = [ 0xff, 0xff, 0xff, 0x7f, 0x00 ];
		assert!( matches!( Descriptor::decode( &bytes ), Err( DescriptorError::TooLarge( _ ))));
	}

	#[test]
	fn streaming_transaction_rejected() {
		let descriptor = Descriptor::service( "bank.Msg", ServiceKind::Transaction, [
			MethodDescriptor::unary( "Watch", "a.Req", "a.Resp" ).server_streaming(),
		]);
		let bytes = descriptor.encode().expect( "encode" );
		assert!( matches!( Descriptor::decode( &bytes ), Err( DescriptorError::Invalid( .. ))));
	}

	#[test]
	fn merge_same_shape_twice_is_noop() {
		let mut catalogue = DescriptorCatalogue::new();
		catalogue.merge( bank() ).expect( "first merge" );
		catalogue.merge( bank() ).expect( "identical merge" );
		assert_eq!( catalogue.len(), 1 );
	}

	#[test]
	fn merge_different_version_conflicts() {
		let mut catalogue = DescriptorCatalogue::new();
		catalogue.merge( bank() ).expect( "first merge" );
		match catalogue.merge( bank().with_version( 2 )) {
			Err( LinkError::DescriptorConflict( name )) => assert_eq!( name.as_str(), "bank.Msg" ),
			other => panic!( "Expected DescriptorConflict, found: {:?}", other ),
		}
	}
}

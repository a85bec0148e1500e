//! How many producers an input accepts.
//!
//! Whether an input is satisfied depends on its kind and on whether it is
//! optional. Service inputs bind to a single producer; event-listener inputs
//! fan in over every producer of the listener type.

use nonempty_collections::NEVec ;

use crate::module_info::{ InputSpec, Kind };



/// Producer count an input expects.
#[derive( Debug, PartialEq, Eq, Copy, Clone )]
pub enum Cardinality {
	/// Required service: exactly one producer.
	ExactlyOne,
	/// Optional service: zero or one producer.
	AtMostOne,
	/// Required listener: one or more producers.
	AtLeastOne,
	/// Optional listener: any number of producers.
	Any,
}

impl std::fmt::Display for Cardinality {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> std::fmt::Result { write!( f, "{:?}", self )}
}

impl From<&InputSpec> for Cardinality {
	fn from( input: &InputSpec ) -> Self { match ( &input.kind, input.optional ) {
		( Kind::Service( _ ), false ) => Self::ExactlyOne,
		( Kind::Service( _ ), true ) => Self::AtMostOne,
		( Kind::EventListener( _ ), false ) => Self::AtLeastOne,
		( Kind::EventListener( _ ), true ) => Self::Any,
	}}
}

/// Outcome of matching an input against the producers present in the graph.
#[derive( Debug, PartialEq, Eq )]
pub enum Satisfaction<T> {
	/// The input binds to these producers.
	Bound( NEVec<T> ),
	/// The input is optional and nothing produces it.
	Absent,
	/// The input is required and nothing produces it.
	Missing,
	/// More producers than the input accepts.
	Ambiguous( NEVec<T> ),
}

impl Cardinality {

	/// Matches this cardinality against the producers found for an input.
	pub fn satisfy<T>( self, producers: Vec<T> ) -> Satisfaction<T> {
		let Some( producers ) = NEVec::try_from_vec( producers ) else {
			return match self {
				Self::ExactlyOne | Self::AtLeastOne => Satisfaction::Missing,
				Self::AtMostOne | Self::Any => Satisfaction::Absent,
			};
		};
		match ( self, producers.len().get() ) {
			( Self::ExactlyOne | Self::AtMostOne, 1 ) | ( Self::AtLeastOne | Self::Any, _ ) => Satisfaction::Bound( producers ),
			( Self::ExactlyOne | Self::AtMostOne, _ ) => Satisfaction::Ambiguous( producers ),
		}
	}

}

#[cfg( test )]
mod tests {
	use super::* ;

	#[test]
	fn optional_service_without_producer_is_absent() {
		assert_eq!( Cardinality::AtMostOne.satisfy( Vec::<u8>::new() ), Satisfaction::Absent );
	}

	#[test]
	fn required_listener_without_producer_is_missing() {
		assert_eq!( Cardinality::AtLeastOne.satisfy( Vec::<u8>::new() ), Satisfaction::Missing );
	}

	#[test]
	fn service_with_two_producers_is_ambiguous() {
		assert!( matches!( Cardinality::ExactlyOne.satisfy( vec![ 1, 2 ]), Satisfaction::Ambiguous( _ )));
	}

	#[test]
	fn listener_fans_in() {
		match Cardinality::Any.satisfy( vec![ 1, 2, 3 ]) {
			Satisfaction::Bound( producers ) => assert_eq!( producers.len().get(), 3 ),
			other => panic!( "Expected Bound, found: {:?}", other ),
		}
	}
}

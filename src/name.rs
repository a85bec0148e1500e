use serde::{ Deserialize, Serialize };



/// Fully-qualified name of a descriptor, service type or module (e.g. `"bank.v1.Msg"`).
///
/// Names are compared byte-wise and ordered lexicographically, which is what
/// keeps every map keyed by them iterating in the same order on every replica.
#[derive( Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize )]
#[serde( transparent )]
pub struct QualifiedName( String );

impl QualifiedName {
	/// Creates a qualified name from any string-like value.
	pub fn new( name: impl Into<String> ) -> Self { Self( name.into() )}

	/// The name as a string slice.
	#[inline] pub fn as_str( &self ) -> &str { &self.0 }

	/// A name is usable when it is non-empty and contains no whitespace or control characters.
	pub fn is_well_formed( &self ) -> bool {
		!self.0.is_empty() && self.0.chars().all(| c | !c.is_whitespace() && !c.is_control() )
	}
}

impl std::fmt::Display for QualifiedName {
	fn fmt( &self, f: &mut std::fmt::Formatter ) -> Result<(), std::fmt::Error> {
		std::fmt::Display::fmt( &self.0, f )
	}
}

impl From<&str> for QualifiedName {
	fn from( name: &str ) -> Self { Self( name.to_string() )}
}

impl From<String> for QualifiedName {
	fn from( name: String ) -> Self { Self( name )}
}

impl From<QualifiedName> for String {
	fn from( name: QualifiedName ) -> Self { name.0 }
}

impl AsRef<str> for QualifiedName {
	fn as_ref( &self ) -> &str { &self.0 }
}

impl std::borrow::Borrow<str> for QualifiedName {
	fn borrow( &self ) -> &str { &self.0 }
}

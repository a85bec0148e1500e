use thiserror::Error ;



/// Errors that can occur when invoking a method on a bound service.
///
/// Call-time errors are recoverable: they are surfaced to whichever logic
/// issued the call. Each variant travels across the boundary as a fixed
/// negative status code, with its message written into the same buffer a
/// successful response would have used.
#[derive( Error, Debug, Clone, PartialEq, Eq )]
pub enum CallError {
	/// The callee could not decode the request.
	#[error( "Decode Error: {0}" )] DecodeError( String ),
	/// The response did not fit the caller's buffer. No response bytes are usable.
	#[error( "Buffer Too Small: {0}" )] BufferTooSmall( String ),
	/// No such method, or the method was called with the wrong streaming shape.
	#[error( "Not Found: {0}" )] NotFound( String ),
	/// The caller may not invoke this method.
	#[error( "Permission Denied: {0}" )] PermissionDenied( String ),
	/// The callee's own logic failed.
	#[error( "Application Error: {0}" )] ApplicationError( String ),
}

impl CallError {

	/// Status code of [`CallError::DecodeError`].
	pub const DECODE_ERROR: i32 = -1 ;
	/// Status code of [`CallError::BufferTooSmall`].
	pub const BUFFER_TOO_SMALL: i32 = -2 ;
	/// Status code of [`CallError::NotFound`].
	pub const NOT_FOUND: i32 = -3 ;
	/// Status code of [`CallError::PermissionDenied`].
	pub const PERMISSION_DENIED: i32 = -4 ;
	/// Status code of [`CallError::ApplicationError`].
	pub const APPLICATION_ERROR: i32 = -5 ;

	/// The negative status code this error travels as.
	pub fn code( &self ) -> i32 { match self {
		Self::DecodeError( _ ) => Self::DECODE_ERROR,
		Self::BufferTooSmall( _ ) => Self::BUFFER_TOO_SMALL,
		Self::NotFound( _ ) => Self::NOT_FOUND,
		Self::PermissionDenied( _ ) => Self::PERMISSION_DENIED,
		Self::ApplicationError( _ ) => Self::APPLICATION_ERROR,
	}}

	/// The human-readable message.
	pub fn message( &self ) -> &str { match self {
		Self::DecodeError( message )
		| Self::BufferTooSmall( message )
		| Self::NotFound( message )
		| Self::PermissionDenied( message )
		| Self::ApplicationError( message ) => message,
	}}

	/// Rebuilds the error from a negative status and the buffer the callee wrote its message into.
	///
	/// The message runs up to the first NUL byte or the end of the buffer.
	/// Codes outside the fixed set are reported as application errors.
	pub fn from_status( status: i32, buffer: &[u8] ) -> Self {
		let end = buffer.iter().position(| byte | *byte == 0 ).unwrap_or( buffer.len() );
		let message = String::from_utf8_lossy( &buffer[ ..end ] ).into_owned();
		match status {
			Self::DECODE_ERROR => Self::DecodeError( message ),
			Self::BUFFER_TOO_SMALL => Self::BufferTooSmall( message ),
			Self::NOT_FOUND => Self::NotFound( message ),
			Self::PERMISSION_DENIED => Self::PermissionDenied( message ),
			Self::APPLICATION_ERROR => Self::ApplicationError( message ),
			other => Self::ApplicationError( format!( "unknown status {}: {}", other, message )),
		}
	}

	/// Interprets the return value of a unary call against the buffer it wrote into.
	///
	/// A non-negative status is the number of bytes written; a count larger
	/// than the buffer is itself reported as [`CallError::BufferTooSmall`].
	///
	/// # Errors
	/// Returns the decoded error when `status` is negative or out of range.
	pub fn check( status: i32, buffer: &[u8] ) -> Result<usize, Self> {
		match usize::try_from( status ) {
			Ok( written ) if written <= buffer.len() => Ok( written ),
			Ok( written ) => Err( Self::BufferTooSmall( format!(
				"callee reported {} bytes, capacity is {}", written, buffer.len(),
			))),
			Err( _ ) => Err( Self::from_status( status, buffer )),
		}
	}

	/// Writes the message into `buffer` (truncated, NUL-terminated when there
	/// is room) and returns the status code, ready to be returned from a method.
	pub fn write_into( &self, buffer: &mut [u8] ) -> i32 {
		let message = self.message().as_bytes();
		let len = message.len().min( buffer.len() );
		buffer[ ..len ].copy_from_slice( &message[ ..len ]);
		if let Some( terminator ) = buffer.get_mut( len ) { *terminator = 0 }
		self.code()
	}

}

#[cfg( test )]
mod tests {
	use super::CallError ;

	#[test]
	fn status_round_trip_keeps_message() {
		let mut buffer = [ 0xffu8; 32 ];
		let code = CallError::PermissionDenied( "nope".into() ).write_into( &mut buffer );
		assert_eq!( CallError::from_status( code, &buffer ), CallError::PermissionDenied( "nope".into() ));
	}

	#[test]
	fn message_truncated_to_buffer() {
		let mut buffer = [ 0u8; 3 ];
		let code = CallError::ApplicationError( "overflowing".into() ).write_into( &mut buffer );
		assert_eq!( CallError::from_status( code, &buffer ).message(), "ove" );
	}

	#[test]
	fn overreported_length_is_buffer_too_small() {
		assert!( matches!( CallError::check( 9, &[ 0u8; 4 ]), Err( CallError::BufferTooSmall( _ ))));
		assert_eq!( CallError::check( 4, &[ 0u8; 4 ]), Ok( 4 ));
	}

	#[test]
	fn unknown_status_is_application_error() {
		assert!( matches!( CallError::from_status( -42, b"x\0" ), CallError::ApplicationError( msg ) if msg.contains( "-42" )));
	}
}

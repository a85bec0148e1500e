//! Callback-driven streaming across the boundary.
//!
//! A stream is a lazy, finite, non-restartable sequence of encoded items. Each
//! item is handed over through one callback invocation and its bytes are only
//! valid until that invocation returns (sinks) or until the next pull
//! (sources). Whoever needs an item past that point copies it.
//!
//! The host side of a stream lives in [`ItemSink`] and [`ItemSource`]. Units
//! written in Rust use [`ItemWriter`] and [`ItemReader`] on the other side.

use std::ffi::c_void ;

use crate::abi::{ request_bytes, ItemSinkFn, ItemSourceFn, Status, STATUS_OK };
use crate::call_error::CallError ;



/// Host-side receiver of a server stream, wrapping the caller's item handler.
pub(crate) struct ItemSink<F> {
	on_item: F,
	failure: Option<CallError>,
}

impl<F: FnMut( &[u8] ) -> Result<(), CallError>> ItemSink<F> {

	pub fn new( on_item: F ) -> Self { Self { on_item, failure: None }}

	/// The `( sink, emit )` pair to hand to the producing method.
	pub fn as_raw( &mut self ) -> ( *mut c_void, ItemSinkFn ) {
		(( self as *mut Self ).cast(), sink_item::<F> )
	}

	/// Folds the producer's return value and the handler's own failure into one result.
	/// A handler failure wins: it is why the producer stopped.
	pub fn finish( self, status: i32, error: &[u8] ) -> Result<(), CallError> {
		match ( self.failure, status ) {
			( Some( failure ), _ ) => Err( failure ),
			( None, 0.. ) => Ok(()),
			( None, status ) => Err( CallError::from_status( status, error )),
		}
	}

}

unsafe extern "C" fn sink_item<F: FnMut( &[u8] ) -> Result<(), CallError>>( sink: *mut c_void, size: usize, item: *const u8 ) -> Status {
	// SAFETY: `sink` is the `ItemSink<F>` handed out by `as_raw` and outlives the call.
	let Some( sink ) = sink.cast::<ItemSink<F>>().as_mut() else { return CallError::APPLICATION_ERROR };
	if sink.failure.is_some() { return CallError::APPLICATION_ERROR }
	match ( sink.on_item )( request_bytes( item, size )) {
		Ok(()) => STATUS_OK,
		Err( err ) => {
			let code = err.code();
			sink.failure = Some( err );
			code
		}
	}
}

/// Host-side producer of a client stream.
pub(crate) struct ItemSource<It: Iterator> {
	items: std::iter::Fuse<It>,
	current: Option<It::Item>,
}

impl<It> ItemSource<It>
where
	It: Iterator,
	It::Item: AsRef<[u8]>,
{

	pub fn new( items: It ) -> Self { Self { items: items.fuse(), current: None }}

	/// The `( source, next )` pair to hand to the consuming method.
	pub fn as_raw( &mut self ) -> ( *mut c_void, ItemSourceFn ) {
		(( self as *mut Self ).cast(), next_item::<It> )
	}

}

unsafe extern "C" fn next_item<It>( source: *mut c_void, size: *mut usize, item: *mut *const u8 ) -> i32
where
	It: Iterator,
	It::Item: AsRef<[u8]>,
{
	// SAFETY: `source` is the `ItemSource<It>` handed out by `as_raw` and outlives the call.
	let Some( source ) = source.cast::<ItemSource<It>>().as_mut() else { return CallError::APPLICATION_ERROR };
	if size.is_null() || item.is_null() { return CallError::APPLICATION_ERROR }
	source.current = source.items.next();
	match &source.current {
		Some( current ) => {
			let bytes = current.as_ref();
			*size = bytes.len();
			*item = bytes.as_ptr();
			1
		},
		None => 0,
	}
}

/// Unit-side writer for a server-streaming method's output.
#[derive( Debug )]
pub struct ItemWriter {
	sink: *mut c_void,
	emit: ItemSinkFn,
	written: usize,
}

impl ItemWriter {

	/// Wraps the `( sink, emit )` pair a server-streaming method received.
	///
	/// # Safety
	/// The pair must be the one passed to the running method, and the writer
	/// must not outlive that call.
	pub unsafe fn new( sink: *mut c_void, emit: ItemSinkFn ) -> Self { Self { sink, emit, written: 0 }}

	/// Delivers one item. The consumer copies what it keeps before this returns.
	///
	/// # Errors
	/// The consumer asked the stream to stop; the producer should return the error's code.
	pub fn write( &mut self, item: &[u8] ) -> Result<(), CallError> {
		// SAFETY: guaranteed by the contract of `new`.
		let status = unsafe { ( self.emit )( self.sink, item.len(), item.as_ptr() )};
		match status {
			STATUS_OK => { self.written += 1 ; Ok(()) },
			status => Err( CallError::from_status( status, b"consumer stopped the stream" )),
		}
	}

	/// Items delivered so far.
	#[inline] pub fn written( &self ) -> usize { self.written }

}

/// Unit-side reader for a client-streaming method's input.
///
/// Yields owned copies, since each pulled item is only valid until the next pull.
#[derive( Debug )]
pub struct ItemReader {
	source: *mut c_void,
	next: ItemSourceFn,
	finished: bool,
}

impl ItemReader {

	/// Wraps the `( source, next )` pair a client-streaming method received.
	///
	/// # Safety
	/// The pair must be the one passed to the running method, and the reader
	/// must not outlive that call.
	pub unsafe fn new( source: *mut c_void, next: ItemSourceFn ) -> Self { Self { source, next, finished: false }}

	/// Pulls the next item and hands it to `visit` without copying it.
	///
	/// # Errors
	/// The producer reported a failure.
	pub fn next_with<T>( &mut self, visit: impl FnOnce( &[u8] ) -> T ) -> Result<Option<T>, CallError> {
		if self.finished { return Ok( None ) }
		let mut size = 0usize ;
		let mut item = std::ptr::null::<u8>();
		// SAFETY: guaranteed by the contract of `new`.
		let status = unsafe { ( self.next )( self.source, &mut size, &mut item )};
		match status {
			1 => Ok( Some( visit( unsafe { request_bytes( item, size )}))),
			0 => { self.finished = true ; Ok( None ) },
			status => {
				self.finished = true ;
				Err( CallError::from_status( status, b"producer failed" ))
			},
		}
	}

}

impl Iterator for ItemReader {
	type Item = Result<Vec<u8>, CallError> ;
	fn next( &mut self ) -> Option<Self::Item> { self.next_with( <[u8]>::to_vec ).transpose() }
}

#[cfg( test )]
mod tests {
	use super::* ;

	#[test]
	fn reader_drains_source_then_stays_finished() {
		let mut source = ItemSource::new([ b"one".to_vec(), b"two".to_vec() ].into_iter() );
		let ( raw, next ) = source.as_raw();
		let mut reader = unsafe { ItemReader::new( raw, next )};
		let items = reader.by_ref().collect::<Result<Vec<_>, _>>().expect( "no failure" );
		assert_eq!( items, [ b"one".to_vec(), b"two".to_vec() ]);
		assert!( reader.next().is_none() );
	}

	#[test]
	fn handler_failure_stops_writer() {
		let mut seen = Vec::new();
		let mut sink = ItemSink::new(| item: &[u8] | match item {
			b"stop" => Err( CallError::ApplicationError( "enough".into() )),
			item => { seen.push( item.to_vec() ); Ok(()) },
		});
		let ( raw, emit ) = sink.as_raw();
		let mut writer = unsafe { ItemWriter::new( raw, emit )};
		writer.write( b"a" ).expect( "accepted" );
		assert!( writer.write( b"stop" ).is_err() );
		assert_eq!( writer.written(), 1 );
		assert_eq!( sink.finish( 0, &[]), Err( CallError::ApplicationError( "enough".into() )));
		assert_eq!( seen, [ b"a".to_vec() ]);
	}
}

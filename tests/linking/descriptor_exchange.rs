use std::ffi::c_void ;
use module_link::abi::{ DescriptorSink, RegisterModuleFn, Status };
use module_link::{ CodeUnit, Descriptor, Host, HostConfig, LinkError, LoadPhase, MethodDescriptor, ServiceKind };
use crate::fixture_units::echo_service ;

fixture_unit! {
	mod unit_bank ;
	descriptors = [ echo_service( "bank.Msg", ServiceKind::Transaction ) ];
	modules = [];
}

fixture_unit! {
	mod unit_bank_again ;
	descriptors = [ echo_service( "bank.Msg", ServiceKind::Transaction ) ];
	modules = [];
}

fixture_unit! {
	mod unit_bank_v2 ;
	descriptors = [ Descriptor::service( "bank.Msg", ServiceKind::Transaction, [
		MethodDescriptor::unary( "Echo", "test.Bytes", "test.Bytes" ),
		MethodDescriptor::unary( "Burn", "bank.MsgBurn", "bank.MsgBurnResponse" ),
	])];
	modules = [];
}

fixture_unit! {
	mod unit_streaming_query ;
	descriptors = [ Descriptor::service( "bank.Query", ServiceKind::Query, [
		MethodDescriptor::unary( "Balances", "bank.QueryBalances", "bank.Balance" ).server_streaming(),
	])];
	modules = [];
}

unsafe extern "C" fn corrupt_descriptors( host: *mut c_void, sink: DescriptorSink ) -> Status {
	let garbage = b"definitely not a descriptor" ;
	sink( host, garbage.len(), garbage.as_ptr() )
}

unsafe extern "C" fn failing_descriptors( _: *mut c_void, _: DescriptorSink ) -> Status { 9 }

unsafe extern "C" fn no_descriptors( _: *mut c_void, _: DescriptorSink ) -> Status { 0 }

unsafe extern "C" fn no_modules( _: *mut c_void, _: RegisterModuleFn ) -> Status { 0 }

unsafe extern "C" fn failing_modules( _: *mut c_void, _: RegisterModuleFn ) -> Status { 4 }

#[test]
fn descriptor_identical_redeclaration_merges() {
	let host = Host::new( HostConfig::default() )
		.load( unit_bank::unit() )
		.and_then(| host | host.load( unit_bank_again::unit() ))
		.expect( "Units failed to load" );
	assert_eq!( host.catalogue().len(), 1 );
}

#[test]
fn descriptor_conflict() {
	match Host::new( HostConfig::default() ).load( unit_bank::unit() ).and_then(| host | host.load( unit_bank_v2::unit() )) {
		Err( LinkError::DescriptorConflict( name )) => assert_eq!( name.as_str(), "bank.Msg" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn descriptor_conflict_on_version() {

	fixture_unit! {
		mod unit_bank_versioned ;
		descriptors = [ echo_service( "bank.Msg", ServiceKind::Transaction ).with_version( 2 ) ];
		modules = [];
	}

	let loaded = Host::new( HostConfig::default() ).load( unit_bank::unit() ).and_then(| host | host.load( unit_bank_versioned::unit() ));
	assert!( matches!( loaded, Err( LinkError::DescriptorConflict( _ ))));

}

#[test]
fn descriptor_streaming_query_rejected() {
	match Host::new( HostConfig::default() ).load( unit_streaming_query::unit() ) {
		Err( LinkError::MalformedDescriptor { unit, reason }) => {
			assert_eq!( unit, "unit_streaming_query" );
			assert!( reason.contains( "cannot stream" ), "{}", reason );
		},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn descriptor_response_capacity_out_of_range() {

	fixture_unit! {
		mod unit_empty_buffer ;
		descriptors = [ Descriptor::service( "z.Query", ServiceKind::Query, [
			MethodDescriptor::unary( "Echo", "test.Bytes", "test.Bytes" ).with_response_capacity( 0 ),
		])];
		modules = [];
	}

	fixture_unit! {
		mod unit_huge_buffer ;
		descriptors = [ Descriptor::service( "z.Query", ServiceKind::Query, [
			MethodDescriptor::unary( "Echo", "test.Bytes", "test.Bytes" ).with_response_capacity( u32::MAX ),
		])];
		modules = [];
	}

	for ( unit, expected ) in [
		( unit_empty_buffer::unit(), "empty response buffer" ),
		( unit_huge_buffer::unit(), "4294967295 bytes" ),
	] {
		match Host::new( HostConfig::default() ).load( unit ) {
			Err( LinkError::MalformedDescriptor { reason, .. }) => assert!( reason.contains( expected ), "{}", reason ),
			Err( err ) => panic!( "Unexpected error: {}", err ),
			Ok( _ ) => panic!( "Expected failure" ),
		}
	}

}

#[test]
fn descriptor_corrupt_bytes() {
	let unit = unsafe { CodeUnit::new( "corrupt", corrupt_descriptors, no_modules )};
	match Host::new( HostConfig::default() ).load( unit ) {
		Err( LinkError::MalformedDescriptor { unit, .. }) => assert_eq!( unit, "corrupt" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn unit_failed_during_descriptor_exchange() {
	let unit = unsafe { CodeUnit::new( "broken", failing_descriptors, no_modules )};
	match Host::new( HostConfig::default() ).load( unit ) {
		Err( LinkError::UnitFailed { unit, phase, status }) => {
			assert_eq!( unit, "broken" );
			assert_eq!( phase, LoadPhase::Descriptors );
			assert_eq!( status, 9 );
		},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn unit_failed_during_registration() {
	let unit = unsafe { CodeUnit::new( "broken", no_descriptors, failing_modules )};
	match Host::new( HostConfig::default() ).load( unit ) {
		Err( LinkError::UnitFailed { phase: LoadPhase::Registration, status: 4, .. }) => {},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

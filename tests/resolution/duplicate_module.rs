use module_link::{ Host, HostConfig, LinkError, ModuleInfo, OutputSpec, ProviderInfo, ServiceKind };
use crate::fixture_units::{ echo_provider, echo_service };

fixture_unit! {
	mod unit_bank ;
	descriptors = [ echo_service( "bank.Msg", ServiceKind::Transaction ) ];
	modules = [ ModuleInfo::new( "bank", [ ProviderInfo::new([], [ OutputSpec::service( "bank.Msg" )])]) => [ echo_provider::<1> ]];
}

fixture_unit! {
	mod unit_bank_fork ;
	descriptors = [ echo_service( "bankfork.Msg", ServiceKind::Transaction ) ];
	modules = [ ModuleInfo::new( "bank", [ ProviderInfo::new([], [ OutputSpec::service( "bankfork.Msg" )])]) => [ echo_provider::<1> ]];
}

#[test]
fn registration_duplicate_module() {
	match Host::new( HostConfig::default() ).load( unit_bank::unit() ).and_then(| host | host.load( unit_bank_fork::unit() )) {
		Err( LinkError::DuplicateModule( module )) => assert_eq!( module.as_str(), "bank" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn registration_same_unit_twice_rejected() {
	match Host::new( HostConfig::default() ).load( unit_bank::unit() ).and_then(| host | host.load( unit_bank::unit() )) {
		Err( LinkError::DuplicateModule( module )) => assert_eq!( module.as_str(), "bank" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

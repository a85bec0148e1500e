use module_link::abi::RawService ;
use module_link::{ CallContext, Caller, Host, HostConfig, InputSpec, LinkError, ModuleInfo, Origin, OutputSpec, ProviderInfo, ServiceKind };
use crate::fixture_units::{ echo_provider, echo_service, ECHO };

fixture_unit! {
	mod unit_consumer ;
	descriptors = [
		echo_service( "host.Clock", ServiceKind::Query ),
		echo_service( "upgrade.Msg", ServiceKind::Transaction ),
	];
	modules = [ ModuleInfo::new( "upgrade", [ ProviderInfo::new(
		[ InputSpec::service( "host.Clock" )],
		[ OutputSpec::service( "upgrade.Msg" )],
	)]) => [ echo_provider::<1> ]];
}

fixture_unit! {
	mod unit_rival ;
	descriptors = [ echo_service( "host.Clock", ServiceKind::Query ) ];
	modules = [ ModuleInfo::new( "clock", [ ProviderInfo::new([], [ OutputSpec::service( "host.Clock" )])]) => [ echo_provider::<1> ]];
}

fn clock() -> RawService {
	RawService::new( std::ptr::null_mut(), &ECHO )
}

#[test]
fn host_supplied_service_satisfies_input() {

	let runtime = unsafe { Host::new( HostConfig::default() ).supply_service( "host.Clock", clock() )}
		.and_then(| host | host.load( unit_consumer::unit() ))
		.and_then(| host | host.link() )
		.expect( "Link failed" );

	let clock = runtime.service( "host.Clock" ).expect( "Clock not bound" );
	assert_eq!( clock.producer(), &Origin::Host );
	let response = runtime.call_owned( "host.Clock", &CallContext::new( Caller::Host ), "Echo", b"tick" ).expect( "Call failed" );
	assert_eq!( response, b"tick" );

}

#[test]
fn host_supplied_service_conflicts_with_provider() {

	let host = unsafe { Host::new( HostConfig::default() ).supply_service( "host.Clock", clock() )}
		.and_then(| host | host.load( unit_rival::unit() ))
		.expect( "Unit failed to load" );

	match host.link() {
		Err( LinkError::DuplicateOutput { producers, .. }) => {
			assert_eq!( producers.len().get(), 2 );
			assert!( producers.into_iter().any(| producer | producer == Origin::Host ));
		},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}

}

#[test]
fn host_supplied_service_twice() {
	let supplied = unsafe { Host::new( HostConfig::default() )
		.supply_service( "host.Clock", clock() )
		.and_then(| host | host.supply_service( "host.Clock", clock() ))
	};
	assert!( matches!( supplied, Err( LinkError::DuplicateOutput { .. })));
}

#[test]
fn host_supplied_service_needs_descriptor() {
	let host = unsafe { Host::new( HostConfig::default() ).supply_service( "host.Unknown", clock() )}.expect( "Supply failed" );
	assert!( matches!( host.link(), Err( LinkError::UndeclaredKind { origin: Origin::Host, .. })));
}

use std::ffi::c_void ;
use module_link::abi::{ RawBuffer, RegisterOutputFn, Status };
use module_link::{ Host, HostConfig, InputSpec, ModuleInfo, OutputSpec, ProviderInfo, ProviderRef, RawClient, ServiceKind };
use crate::fixture_units::{ echo_provider, echo_service };

/// Registers its output only if its single input is absent.
unsafe extern "C" fn expects_absent_input(
	config_size: usize,
	config: *const u8,
	inputs: *const *const RawClient,
	host: *mut c_void,
	register_output: RegisterOutputFn,
	error: *mut RawBuffer,
) -> Status {
	match ( *inputs ).is_null() {
		true => echo_provider::<1>( config_size, config, inputs, host, register_output, error ),
		false => 1,
	}
}

/// Registers its output only if its single input is present.
unsafe extern "C" fn expects_present_input(
	config_size: usize,
	config: *const u8,
	inputs: *const *const RawClient,
	host: *mut c_void,
	register_output: RegisterOutputFn,
	error: *mut RawBuffer,
) -> Status {
	match ( *inputs ).as_ref() {
		Some( client ) if client.method_count() == 1 => echo_provider::<1>( config_size, config, inputs, host, register_output, error ),
		_ => 1,
	}
}

fixture_unit! {
	mod unit_optional_absent ;
	descriptors = [
		echo_service( "fees.Query", ServiceKind::Query ),
		echo_service( "auth.Msg", ServiceKind::Transaction ),
	];
	modules = [ ModuleInfo::new( "auth", [ ProviderInfo::new(
		[ InputSpec::service( "fees.Query" ).optional() ],
		[ OutputSpec::service( "auth.Msg" )],
	)]) => [ expects_absent_input ]];
}

fixture_unit! {
	mod unit_optional_present ;
	descriptors = [
		echo_service( "fees.Query", ServiceKind::Query ),
		echo_service( "auth.Msg", ServiceKind::Transaction ),
	];
	modules = [
		ModuleInfo::new( "auth", [ ProviderInfo::new(
			[ InputSpec::service( "fees.Query" ).optional() ],
			[ OutputSpec::service( "auth.Msg" )],
		)]) => [ expects_present_input ],
		ModuleInfo::new( "fees", [ ProviderInfo::new([], [ OutputSpec::service( "fees.Query" )])]) => [ echo_provider::<1> ],
	];
}

fn modules( order: &[ProviderRef] ) -> Vec<&str> {
	order.iter().map(| provider | provider.module().as_str() ).collect()
}

#[test]
fn optional_input_absent_receives_null() {
	let runtime = Host::new( HostConfig::default() )
		.load( unit_optional_absent::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" );
	assert!( runtime.service( "auth.Msg" ).is_some() );
}

#[test]
fn optional_input_present_orders_consumer_after_producer() {
	let runtime = Host::new( HostConfig::default() )
		.load( unit_optional_present::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" );
	assert_eq!( modules( runtime.execution_order() ), [ "fees", "auth" ]);
}

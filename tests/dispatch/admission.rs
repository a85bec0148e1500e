use module_link::{ CallContext, CallError, Caller, Descriptor, Host, HostConfig, MethodDescriptor, ModuleInfo, OutputSpec, ProviderInfo, Runtime, ServiceKind };
use crate::fixture_units::{ echo_provider, echo_service };

fixture_unit! {
	mod unit_kinds ;
	descriptors = [
		echo_service( "bank.Msg", ServiceKind::Transaction ),
		Descriptor::service( "bank.Query", ServiceKind::Query, [
			MethodDescriptor::unary( "Echo", "test.Bytes", "test.Bytes" ).cross_module(),
		]),
		echo_service( "bank.Internal", ServiceKind::Internal ),
		echo_service( "bank.Lifecycle", ServiceKind::Lifecycle ),
		echo_service( "fees.Query", ServiceKind::Query ),
	];
	modules = [
		ModuleInfo::new( "bank", [ ProviderInfo::new([], [
			OutputSpec::service( "bank.Msg" ),
			OutputSpec::service( "bank.Query" ),
			OutputSpec::service( "bank.Internal" ),
			OutputSpec::service( "bank.Lifecycle" ),
		])]) => [ echo_provider::<4> ],
		ModuleInfo::new( "fees", [ ProviderInfo::new([], [ OutputSpec::service( "fees.Query" )])]) => [ echo_provider::<1> ],
	];
}

fn runtime() -> Runtime {
	Host::new( HostConfig::default() )
		.load( unit_kinds::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" )
}

fn admitted( runtime: &Runtime, service: &str, caller: Caller<'_> ) -> bool {
	match runtime.call_owned( service, &CallContext::new( caller ), "Echo", b"ping" ) {
		Ok( response ) => { assert_eq!( response, b"ping" ); true },
		Err( CallError::PermissionDenied( _ )) => false,
		Err( err ) => panic!( "Unexpected error: {}", err ),
	}
}

#[test]
fn transaction_admits_external_and_modules() {
	let runtime = runtime();
	assert!( admitted( &runtime, "bank.Msg", Caller::External ));
	assert!( admitted( &runtime, "bank.Msg", Caller::Module( "gov" )));
	assert!( !admitted( &runtime, "bank.Msg", Caller::Host ));
}

#[test]
fn query_admits_modules_only_when_cross_module() {
	let runtime = runtime();
	assert!( admitted( &runtime, "bank.Query", Caller::External ));
	assert!( admitted( &runtime, "bank.Query", Caller::Host ));
	assert!( admitted( &runtime, "bank.Query", Caller::Module( "gov" )));
	assert!( admitted( &runtime, "fees.Query", Caller::External ));
	assert!( !admitted( &runtime, "fees.Query", Caller::Module( "gov" )));
}

#[test]
fn internal_admits_modules_only() {
	let runtime = runtime();
	assert!( admitted( &runtime, "bank.Internal", Caller::Module( "gov" )));
	assert!( !admitted( &runtime, "bank.Internal", Caller::External ));
	assert!( !admitted( &runtime, "bank.Internal", Caller::Host ));
}

#[test]
fn lifecycle_admits_host_only() {
	let runtime = runtime();
	assert!( admitted( &runtime, "bank.Lifecycle", Caller::Host ));
	assert!( !admitted( &runtime, "bank.Lifecycle", Caller::External ));
	assert!( !admitted( &runtime, "bank.Lifecycle", Caller::Module( "gov" )));
}

#[test]
fn unknown_method_not_found() {
	let runtime = runtime();
	match runtime.call_owned( "bank.Msg", &CallContext::new( Caller::External ), "Burn", b"" ) {
		Err( CallError::NotFound( message )) => assert!( message.contains( "Burn" ), "{}", message ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn unknown_method_index_not_found() {
	let runtime = runtime();
	let service = runtime.service( "bank.Msg" ).expect( "Service not bound" );
	let mut response = [ 0u8; 16 ];
	let result = service.invoke_unary( &CallContext::new( Caller::External ), module_link::MethodIndex( 3 ), b"", &mut response );
	assert!( matches!( result, Err( CallError::NotFound( _ ))));
}

#[test]
fn unknown_service_not_found() {
	let runtime = runtime();
	let result = runtime.call_owned( "staking.Msg", &CallContext::new( Caller::External ), "Echo", b"" );
	assert!( matches!( result, Err( CallError::NotFound( _ ))));
}

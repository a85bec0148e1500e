use std::sync::Arc ;
use std::sync::atomic::{ AtomicUsize, Ordering };
use tracing_test::traced_test ;
use module_link::{
	CallContext, CallError, Caller, Host, HostConfig, MethodDescriptor, ModuleInfo,
	OutputSpec, ProviderInfo, QualifiedName, Runtime, ServiceKind,
};
use crate::fixture_units::{ echo_provider, echo_service };

fixture_unit! {
	mod unit_bank ;
	descriptors = [
		echo_service( "bank.Msg", ServiceKind::Transaction ),
		echo_service( "bank.Lifecycle", ServiceKind::Lifecycle ),
	];
	modules = [ ModuleInfo::new( "bank", [ ProviderInfo::new([], [
		OutputSpec::service( "bank.Msg" ),
		OutputSpec::service( "bank.Lifecycle" ),
	])]) => [ echo_provider::<2> ]];
}

fn runtime( consulted: Arc<AtomicUsize> ) -> Runtime {
	Host::new( HostConfig::default() )
		.with_policy( move | caller: &Caller<'_>, service: &QualifiedName, _: &MethodDescriptor | {
			consulted.fetch_add( 1, Ordering::SeqCst );
			match caller.module() {
				Some( "gov" ) => Err( format!( "gov may not call {}", service )),
				_ => Ok(()),
			}
		})
		.load( unit_bank::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" )
}

#[test]
#[traced_test]
fn call_policy_rejects_caller() {

	let runtime = runtime( Arc::default() );

	match runtime.call_owned( "bank.Msg", &CallContext::new( Caller::Module( "gov" )), "Echo", b"" ) {
		Err( CallError::PermissionDenied( reason )) => assert_eq!( reason, "gov may not call bank.Msg" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
	assert!( logs_contain( "call denied by policy" ));

	let response = runtime.call_owned( "bank.Msg", &CallContext::new( Caller::Module( "staking" )), "Echo", b"ok" ).expect( "Call failed" );
	assert_eq!( response, b"ok" );

}

#[test]
fn call_policy_runs_after_admission() {

	let consulted = Arc::new( AtomicUsize::new( 0 ));
	let runtime = runtime( Arc::clone( &consulted ));

	let result = runtime.call_owned( "bank.Lifecycle", &CallContext::new( Caller::External ), "Echo", b"" );
	assert!( matches!( result, Err( CallError::PermissionDenied( _ ))));
	assert_eq!( consulted.load( Ordering::SeqCst ), 0 );

	runtime.call_owned( "bank.Lifecycle", &CallContext::new( Caller::Host ), "Echo", b"" ).expect( "Call failed" );
	assert_eq!( consulted.load( Ordering::SeqCst ), 1 );

}

use std::ffi::c_void ;
use std::sync::atomic::{ AtomicUsize, Ordering };
use module_link::abi::{ RawBuffer, RawMethod, RawService, RegisterOutputFn, Status };
use module_link::{
	CallContext, CallError, Caller, Host, HostConfig, InputSpec, ModuleInfo, OutputSpec,
	ProviderInfo, RawClient, Runtime, ServiceKind,
};
use crate::fixture_units::{ echo_service, relay_provider };

/// Counts invocations in the `AtomicUsize` held as instance.
unsafe extern "C" fn count( instance: *mut c_void, _: &CallContext<'_>, _: usize, _: *const u8, _: usize, _: *mut u8 ) -> i32 {
	if let Some( counter ) = instance.cast_const().cast::<AtomicUsize>().as_ref() { counter.fetch_add( 1, Ordering::SeqCst ); }
	0
}

static COUNT: [RawMethod; 1] = [ RawMethod::unary( count )];
static SLASHING_CALLS: AtomicUsize = AtomicUsize::new( 0 );
static DISTRIBUTION_CALLS: AtomicUsize = AtomicUsize::new( 0 );

unsafe extern "C" fn slashing_listener(
	_: usize, _: *const u8, _: *const *const RawClient,
	host: *mut c_void, register_output: RegisterOutputFn, _: *mut RawBuffer,
) -> Status {
	register_output( host, &RawService::new(( &SLASHING_CALLS as *const AtomicUsize ).cast_mut().cast(), &COUNT ))
}

unsafe extern "C" fn distribution_listener(
	_: usize, _: *const u8, _: *const *const RawClient,
	host: *mut c_void, register_output: RegisterOutputFn, _: *mut RawBuffer,
) -> Status {
	register_output( host, &RawService::new(( &DISTRIBUTION_CALLS as *const AtomicUsize ).cast_mut().cast(), &COUNT ))
}

fixture_unit! {
	mod unit_hooks ;
	descriptors = [
		echo_service( "staking.Hooks", ServiceKind::Internal ),
		echo_service( "staking.Msg", ServiceKind::Transaction ),
	];
	modules = [
		ModuleInfo::new( "slashing", [ ProviderInfo::new([], [ OutputSpec::listener( "staking.Hooks" )])]) => [ slashing_listener ],
		ModuleInfo::new( "distribution", [ ProviderInfo::new([], [ OutputSpec::listener( "staking.Hooks" )])]) => [ distribution_listener ],
		ModuleInfo::new( "staking", [ ProviderInfo::new(
			[ InputSpec::listener( "staking.Hooks" )],
			[ OutputSpec::service( "staking.Msg" )],
		)]) => [ relay_provider ],
	];
}

fn calls() -> ( usize, usize ) {
	( SLASHING_CALLS.load( Ordering::SeqCst ), DISTRIBUTION_CALLS.load( Ordering::SeqCst ))
}

fn runtime() -> Runtime {
	Host::new( HostConfig::default() )
		.load( unit_hooks::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" )
}

/// The counters are shared statics, so every check lives in one test.
#[test]
fn listeners_receive_every_emitted_call() {

	let runtime = runtime();
	assert_eq!( runtime.listeners( "staking.Hooks" ).len(), 2 );
	assert!( runtime.service( "staking.Hooks" ).is_none() );

	let emitted = runtime.emit( "staking.Hooks", &CallContext::new( Caller::Module( "staking" )), "Echo", b"validator" );
	assert_eq!( emitted, Ok( 2 ));
	assert_eq!( calls(), ( 1, 1 ));

	let response = runtime.call_owned( "staking.Msg", &CallContext::new( Caller::External ), "Echo", b"bond" ).expect( "Call failed" );
	assert!( response.is_empty() );
	assert_eq!( calls(), ( 2, 2 ));

	let denied = runtime.emit( "staking.Hooks", &CallContext::new( Caller::External ), "Echo", b"" );
	assert!( matches!( denied, Err( CallError::PermissionDenied( _ ))));
	assert_eq!( calls(), ( 2, 2 ));

	assert_eq!( runtime.emit( "gov.Hooks", &CallContext::new( Caller::Module( "gov" )), "Echo", b"" ), Ok( 0 ));

}

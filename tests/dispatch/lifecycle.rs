use module_link::{ Descriptor, Host, HostConfig, LinkError, MethodDescriptor, ModuleInfo, OutputSpec, ProviderInfo, ServiceKind };
use crate::fixture_units::echo_provider ;

fn hooks( name: &str, methods: &[&str] ) -> Descriptor {
	Descriptor::service( name, ServiceKind::Lifecycle, methods.iter()
		.map(| method | MethodDescriptor::unary( *method, "test.Bytes", "test.Bytes" )))
}

fixture_unit! {
	mod unit_hooks ;
	descriptors = [
		hooks( "mint.Hooks", &[ "BeginBlock" ]),
		hooks( "bank.Hooks", &[ "EndBlock" ]),
		hooks( "staking.Hooks", &[ "BeginBlock" ]),
	];
	modules = [
		ModuleInfo::new( "mint", [ ProviderInfo::new([], [ OutputSpec::service( "mint.Hooks" )])]) => [ echo_provider::<1> ],
		ModuleInfo::new( "bank", [ ProviderInfo::new([], [ OutputSpec::service( "bank.Hooks" )])]) => [ echo_provider::<1> ],
		ModuleInfo::new( "staking", [ ProviderInfo::new([], [ OutputSpec::service( "staking.Hooks" )])]) => [ echo_provider::<1> ],
	];
}

fixture_unit! {
	mod unit_double_hooks ;
	descriptors = [
		hooks( "mint.Hooks", &[ "BeginBlock" ]),
		hooks( "mint.MoreHooks", &[ "EndBlock" ]),
	];
	modules = [ ModuleInfo::new( "mint", [
		ProviderInfo::new([], [ OutputSpec::service( "mint.Hooks" )]),
		ProviderInfo::new([], [ OutputSpec::service( "mint.MoreHooks" )]),
	]) => [ echo_provider::<1>, echo_provider::<1> ]];
}

#[test]
fn lifecycle_hook_reaches_services_that_define_it() {

	let runtime = Host::new( HostConfig::default() )
		.load( unit_hooks::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" );

	assert_eq!( runtime.run_lifecycle( "BeginBlock", b"height=1" ), Ok( 2 ));
	assert_eq!( runtime.run_lifecycle( "EndBlock", b"height=1" ), Ok( 1 ));
	assert_eq!( runtime.run_lifecycle( "Commit", b"" ), Ok( 0 ));

}

#[test]
fn lifecycle_services_stay_callable_by_name() {

	let runtime = Host::new( HostConfig::default() )
		.load( unit_hooks::unit() )
		.and_then(| host | host.link() )
		.expect( "Link failed" );

	let hooks = runtime.service( "bank.Hooks" ).expect( "Service not bound" );
	assert_eq!( hooks.kind(), ServiceKind::Lifecycle );
	assert!( hooks.method_index( "BeginBlock" ).is_none() );

}

#[test]
fn module_with_two_lifecycle_services() {

	let host = Host::new( HostConfig::default() ).load( unit_double_hooks::unit() ).expect( "Unit failed to load" );

	match host.resolve() {
		Err( LinkError::DuplicateLifecycle( module )) => assert_eq!( module.as_str(), "mint" ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}

}

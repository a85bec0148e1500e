use module_link::{ Host, HostConfig, InputSpec, Kind, LinkError, ModuleInfo, Origin, OutputSpec, ProviderInfo, ServiceKind };
use crate::fixture_units::{ echo_provider, echo_service };

fixture_unit! {
	mod unit_consumer ;
	descriptors = [
		echo_service( "oracle.Prices", ServiceKind::Query ),
		echo_service( "dex.Msg", ServiceKind::Transaction ),
	];
	modules = [ ModuleInfo::new( "C", [ ProviderInfo::new(
		[ InputSpec::service( "oracle.Prices" )],
		[ OutputSpec::service( "dex.Msg" )],
	)]) => [ echo_provider::<1> ]];
}

fixture_unit! {
	mod unit_undeclared ;
	descriptors = [];
	modules = [ ModuleInfo::new( "ghost", [ ProviderInfo::new([], [ OutputSpec::service( "ghost.Nothing" )])]) => [ echo_provider::<1> ]];
}

#[test]
fn resolution_missing_input() {

	let host = Host::new( HostConfig::default() ).load( unit_consumer::unit() ).expect( "Unit failed to load" );

	match host.resolve() {
		Err( LinkError::MissingInput { kind, consumer }) => {
			assert_eq!( kind, Kind::Service( "oracle.Prices".into() ));
			assert_eq!( consumer.module().as_str(), "C" );
			assert_eq!( consumer.index(), 0 );
		},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}

}

#[test]
fn resolution_missing_input_message_names_kind_and_consumer() {

	let host = Host::new( HostConfig::default() ).load( unit_consumer::unit() ).expect( "Unit failed to load" );

	match host.link() {
		Err( err ) => {
			let message = err.to_string();
			assert!( message.contains( "oracle.Prices" ), "{}", message );
			assert!( message.contains( "C#0" ), "{}", message );
		},
		Ok( _ ) => panic!( "Expected failure" ),
	}

}

#[test]
fn resolution_undeclared_kind() {

	let host = Host::new( HostConfig::default() ).load( unit_undeclared::unit() ).expect( "Unit failed to load" );

	match host.resolve() {
		Err( LinkError::UndeclaredKind { kind, origin: Origin::Provider( provider )}) => {
			assert_eq!( kind.name().as_str(), "ghost.Nothing" );
			assert_eq!( provider.module().as_str(), "ghost" );
		},
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}

}

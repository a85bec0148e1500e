use module_link::{ ConfigError, HostConfig };

#[test]
fn config_default_above_max() {
	match HostConfig::from_toml_str( "default_response_capacity = 4096\nmax_response_capacity = 1024\n" ) {
		Err( ConfigError::Invalid( message )) => assert!( message.contains( "default_response_capacity" ), "{}", message ),
		Err( err ) => panic!( "Unexpected error: {}", err ),
		Ok( _ ) => panic!( "Expected failure" ),
	}
}

#[test]
fn config_zero_capacity() {
	assert!( matches!( HostConfig::from_toml_str( "default_response_capacity = 0\n" ), Err( ConfigError::Invalid( _ ))));
}

#[test]
fn config_capacity_beyond_status_range() {
	let config = format!( "max_response_capacity = {}\n", u64::from( u32::MAX ));
	assert!( matches!( HostConfig::from_toml_str( &config ), Err( ConfigError::Invalid( _ ))));
}

#[test]
fn config_unknown_field() {
	assert!( matches!( HostConfig::from_toml_str( "max_depth = 3\n" ), Err( ConfigError::Toml( _ ))));
}

#[test]
fn config_malformed_toml() {
	assert!( matches!( HostConfig::from_toml_str( "max_call_depth = \n" ), Err( ConfigError::Toml( _ ))));
}

#[test]
fn config_missing_file() {
	assert!( matches!( HostConfig::from_file( "/nonexistent/module-link.toml" ), Err( ConfigError::Io( _ ))));
}

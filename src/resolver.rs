//! Orders providers so that every input is bound before its consumer runs.
//!
//! Providers live in an arena indexed by declaration position. Edges run from
//! each producer of an input's kind to the consumer. The order is computed
//! with Kahn's algorithm; whenever several providers are ready at once, the
//! one declared first is taken. Nothing here iterates a hash-ordered
//! collection, so the same registrations always yield the same order.

use std::collections::{ BTreeMap, BTreeSet };
use itertools::Itertools ;
use nonempty_collections::NEVec ;
use tracing::debug ;

use crate::abi::ProviderFn ;
use crate::cardinality::{ Cardinality, Satisfaction };
use crate::descriptor::{ DescriptorCatalogue, ServiceKind };
use crate::error::LinkError ;
use crate::module_info::{ Kind, ProviderInfo };
use crate::name::QualifiedName ;
use crate::registry::{ Origin, ProviderRef, ProviderRegistry };



pub(crate) type NodeIndex = usize ;

/// Resolution state of a provider.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub(crate) enum NodeState {
	/// Still waiting on at least one producer.
	Unvisited,
	/// Every producer is resolved; waiting to be picked.
	InProgress,
	/// Placed at this position of the execution order.
	Resolved( usize ),
}

pub(crate) struct ProviderNode<'r> {
	pub reference: ProviderRef,
	pub info: &'r ProviderInfo,
	pub func: ProviderFn,
	pub state: NodeState,
	predecessors: BTreeSet<NodeIndex>,
	successors: BTreeSet<NodeIndex>,
}

/// A valid execution order over every registered provider.
pub(crate) struct Resolution<'r> {
	nodes: Vec<ProviderNode<'r>>,
	order: Vec<NodeIndex>,
}

impl<'r> Resolution<'r> {

	/// Providers in execution order.
	pub fn ordered( &self ) -> impl Iterator<Item = &ProviderNode<'r>> {
		self.order.iter().map(| index | &self.nodes[ *index ])
	}

	pub fn references( &self ) -> Vec<ProviderRef> {
		self.ordered().map(| node | node.reference.clone() ).collect()
	}

}

/// Resolves the execution order of every provider in `registry`.
///
/// `supplied` lists the service types the host provides itself; they count as
/// produced before any provider runs.
///
/// # Errors
/// - [`LinkError::UndeclaredKind`] if a kind names no service descriptor
/// - [`LinkError::DuplicateOutput`] if a service type has several producers
/// - [`LinkError::DuplicateLifecycle`] if a module produces several lifecycle services
/// - [`LinkError::MissingInput`] if a required input has no producer
/// - [`LinkError::CyclicDependency`] if no order satisfies every input
pub(crate) fn resolve<'r>(
	registry: &'r ProviderRegistry,
	catalogue: &DescriptorCatalogue,
	supplied: &BTreeSet<QualifiedName>,
) -> Result<Resolution<'r>, LinkError> {

	let mut nodes = registry.providers()
		.map(|( reference, info, func )| ProviderNode {
			reference,
			info,
			func,
			state: NodeState::Unvisited,
			predecessors: BTreeSet::new(),
			successors: BTreeSet::new(),
		})
		.collect::<Vec<_>>();

	check_declared( &nodes, catalogue, supplied )?;

	let producers = nodes.iter().enumerate()
		.flat_map(|( index, node )| node.info.outputs.iter().map( move | output | ( &output.kind, index )))
		.into_group_map()
		.into_iter()
		.collect::<BTreeMap<_, _>>();

	check_unique_services( &nodes, &producers, supplied )?;
	check_lifecycle( &nodes, catalogue )?;

	let mut edges = Vec::new();
	for ( consumer, node ) in nodes.iter().enumerate() {
		for input in &node.info.inputs {
			let host_supplied = matches!( &input.kind, Kind::Service( name ) if supplied.contains( name ));
			let candidates = host_supplied.then_some( None ).into_iter()
				.chain( producers.get( &input.kind ).into_iter().flatten().map(| index | Some( *index )))
				.collect::<Vec<_>>();
			match Cardinality::from( input ).satisfy( candidates ) {
				Satisfaction::Bound( bound ) => bound.into_iter().flatten().for_each(| producer | edges.push(( producer, consumer ))),
				Satisfaction::Absent => {},
				Satisfaction::Missing => return Err( LinkError::MissingInput {
					kind: input.kind.clone(),
					consumer: node.reference.clone(),
				}),
				Satisfaction::Ambiguous( bound ) => {
					let origins = bound.into_iter().map(| producer | origin_of( &nodes, producer )).collect::<Vec<_>>();
					if let Some( producers ) = NEVec::try_from_vec( origins ) {
						return Err( LinkError::DuplicateOutput { kind: input.kind.clone(), producers });
					}
				},
			}
		}
	}
	for ( producer, consumer ) in edges {
		nodes[ consumer ].predecessors.insert( producer );
		nodes[ producer ].successors.insert( consumer );
	}

	let order = topological_order( &mut nodes )?;
	debug!( order = %order.iter().map(| index | &nodes[ *index ].reference ).join( " -> " ), "resolved provider order" );
	Ok( Resolution { nodes, order })

}

fn origin_of( nodes: &[ProviderNode<'_>], producer: Option<NodeIndex> ) -> Origin {
	match producer {
		Some( index ) => Origin::Provider( nodes[ index ].reference.clone() ),
		None => Origin::Host,
	}
}

fn check_declared(
	nodes: &[ProviderNode<'_>],
	catalogue: &DescriptorCatalogue,
	supplied: &BTreeSet<QualifiedName>,
) -> Result<(), LinkError> {
	if let Some( name ) = supplied.iter().find(| name | catalogue.service( name.as_str() ).is_none() ) {
		return Err( LinkError::UndeclaredKind { kind: Kind::Service( name.clone() ), origin: Origin::Host });
	}
	nodes.iter()
		.flat_map(| node | node.info.inputs.iter().map(| input | &input.kind )
			.chain( node.info.outputs.iter().map(| output | &output.kind ))
			.map( move | kind | ( node, kind ))
		)
		.find(|( _, kind )| catalogue.service( kind.name().as_str() ).is_none() )
		.map_or( Ok(()), |( node, kind )| Err( LinkError::UndeclaredKind {
			kind: kind.clone(),
			origin: Origin::Provider( node.reference.clone() ),
		}))
}

fn check_unique_services(
	nodes: &[ProviderNode<'_>],
	producers: &BTreeMap<&Kind, Vec<NodeIndex>>,
	supplied: &BTreeSet<QualifiedName>,
) -> Result<(), LinkError> {
	for ( kind, indices ) in producers {
		let Kind::Service( name ) = kind else { continue };
		let origins = supplied.contains( name ).then_some( Origin::Host ).into_iter()
			.chain( indices.iter().map(| index | Origin::Provider( nodes[ *index ].reference.clone() )))
			.collect::<Vec<_>>();
		if origins.len() > 1 {
			if let Some( producers ) = NEVec::try_from_vec( origins ) {
				return Err( LinkError::DuplicateOutput { kind: ( *kind ).clone(), producers });
			}
		}
	}
	Ok(())
}

fn check_lifecycle( nodes: &[ProviderNode<'_>], catalogue: &DescriptorCatalogue ) -> Result<(), LinkError> {
	nodes.iter()
		.flat_map(| node | node.info.outputs.iter().map( move | output | ( node.reference.module(), &output.kind )))
		.filter(|( _, kind )| match kind {
			Kind::Service( name ) => catalogue.service( name.as_str() ).is_some_and(| shape | shape.kind == ServiceKind::Lifecycle ),
			Kind::EventListener( _ ) => false,
		})
		.map(|( module, _ )| module )
		.duplicates()
		.next()
		.map_or( Ok(()), | module | Err( LinkError::DuplicateLifecycle( module.clone() )))
}

/// Kahn's algorithm, always taking the lowest-indexed ready node.
fn topological_order( nodes: &mut [ProviderNode<'_>] ) -> Result<Vec<NodeIndex>, LinkError> {

	let mut pending = nodes.iter().map(| node | node.predecessors.len() ).collect::<Vec<_>>();
	let mut ready = pending.iter().positions(| count | *count == 0 ).collect::<BTreeSet<_>>();
	ready.iter().for_each(| index | nodes[ *index ].state = NodeState::InProgress );

	let mut order = Vec::with_capacity( nodes.len() );
	while let Some( index ) = ready.pop_first() {
		nodes[ index ].state = NodeState::Resolved( order.len() );
		order.push( index );
		for successor in nodes[ index ].successors.clone() {
			pending[ successor ] -= 1 ;
			if pending[ successor ] == 0 {
				nodes[ successor ].state = NodeState::InProgress ;
				ready.insert( successor );
			}
		}
	}

	let unresolved = nodes.iter()
		.filter(| node | !matches!( node.state, NodeState::Resolved( _ )))
		.map(| node | node.reference.clone() )
		.collect::<Vec<_>>();
	match NEVec::try_from_vec( unresolved ) {
		None => Ok( order ),
		Some( unresolved ) => Err( LinkError::CyclicDependency( unresolved )),
	}

}

#[cfg( test )]
mod tests {
	use std::ffi::c_void ;
	use proptest::prelude::* ;

	use super::* ;
	use crate::abi::{ RawBuffer, RegisterOutputFn, Status };
	use crate::client::RawClient ;
	use crate::descriptor::{ Descriptor, MethodDescriptor };
	use crate::module_info::{ InputSpec, ModuleInfo, OutputSpec };
	use crate::registry::RegisteredModule ;

	unsafe extern "C" fn noop(
		_: usize, _: *const u8, _: *const *const RawClient, _: *mut c_void, _: RegisterOutputFn, _: *mut RawBuffer,
	) -> Status { 0 }

	fn catalogue( names: impl IntoIterator<Item = String> ) -> DescriptorCatalogue {
		let mut catalogue = DescriptorCatalogue::new();
		for name in names {
			catalogue.merge( Descriptor::service( name, ServiceKind::Internal, [
				MethodDescriptor::unary( "Call", "test.Req", "test.Resp" ),
			])).expect( "distinct names" );
		}
		catalogue
	}

	fn registry( modules: Vec<ModuleInfo> ) -> ProviderRegistry {
		let mut registry = ProviderRegistry::new();
		for ( unit, info ) in modules.into_iter().enumerate() {
			let providers = vec![ noop as ProviderFn; info.providers.len() ];
			registry.register( RegisteredModule { unit, info, providers }).expect( "distinct modules" );
		}
		registry
	}

	fn modules( names: &[&str] ) -> Vec<String> { names.iter().map(| name | name.to_string() ).collect() }

	#[test]
	fn ties_broken_by_declaration_order() {
		let registry = registry( vec![
			ModuleInfo::new( "c", [ ProviderInfo::new([], [ OutputSpec::service( "svc.C" )])]),
			ModuleInfo::new( "a", [ ProviderInfo::new([], [ OutputSpec::service( "svc.A" )])]),
			ModuleInfo::new( "b", [ ProviderInfo::new([], [ OutputSpec::service( "svc.B" )])]),
		]);
		let catalogue = catalogue( modules( &[ "svc.A", "svc.B", "svc.C" ]));
		let resolution = resolve( &registry, &catalogue, &BTreeSet::new() ).expect( "resolves" );
		let order = resolution.references().iter().map(| r | r.module().to_string() ).collect::<Vec<_>>();
		assert_eq!( order, [ "c", "a", "b" ]);
	}

	#[test]
	fn listener_consumer_runs_after_every_listener() {
		let registry = registry( vec![
			ModuleInfo::new( "emitter", [ ProviderInfo::new([ InputSpec::listener( "evt.Hooks" )], [])]),
			ModuleInfo::new( "one", [ ProviderInfo::new([], [ OutputSpec::listener( "evt.Hooks" )])]),
			ModuleInfo::new( "two", [ ProviderInfo::new([], [ OutputSpec::listener( "evt.Hooks" )])]),
		]);
		let catalogue = catalogue( modules( &[ "evt.Hooks" ]));
		let resolution = resolve( &registry, &catalogue, &BTreeSet::new() ).expect( "resolves" );
		let order = resolution.references().iter().map(| r | r.module().to_string() ).collect::<Vec<_>>();
		assert_eq!( order, [ "one", "two", "emitter" ]);
	}

	#[test]
	fn self_dependency_is_a_cycle() {
		let registry = registry( vec![
			ModuleInfo::new( "loop", [ ProviderInfo::new([ InputSpec::service( "svc.L" )], [ OutputSpec::service( "svc.L" )])]),
		]);
		let catalogue = catalogue( modules( &[ "svc.L" ]));
		match resolve( &registry, &catalogue, &BTreeSet::new() ) {
			Err( LinkError::CyclicDependency( providers )) => assert_eq!( providers.len().get(), 1 ),
			Err( err ) => panic!( "Unexpected error: {}", err ),
			Ok( _ ) => panic!( "Expected failure" ),
		}
	}

	#[test]
	fn host_supplied_and_provided_service_is_duplicate() {
		let registry = registry( vec![
			ModuleInfo::new( "store", [ ProviderInfo::new([], [ OutputSpec::service( "svc.Store" )])]),
		]);
		let catalogue = catalogue( modules( &[ "svc.Store" ]));
		let supplied = BTreeSet::from([ QualifiedName::from( "svc.Store" )]);
		match resolve( &registry, &catalogue, &supplied ) {
			Err( LinkError::DuplicateOutput { producers, .. }) => assert_eq!( producers.len().get(), 2 ),
			Err( err ) => panic!( "Unexpected error: {}", err ),
			Ok( _ ) => panic!( "Expected failure" ),
		}
	}

	/// Module `i` produces `svc.i` and consumes a subset of `svc.j` for `j < i`;
	/// modules are then declared in a shuffled order.
	fn dag() -> impl Strategy<Value = Vec<ModuleInfo>> {
		( 1usize..12 ).prop_flat_map(| count | (
			proptest::collection::vec( proptest::collection::vec( any::<bool>(), count ), count ),
			Just(( 0..count ).collect::<Vec<_>>() ).prop_shuffle(),
		)).prop_map(|( adjacency, declaration )| declaration.into_iter().map(| module | ModuleInfo::new(
			format!( "m{}", module ),
			[ ProviderInfo::new(
				( 0..module ).filter(| dep | adjacency[ module ][ *dep ]).map(| dep | InputSpec::service( format!( "svc.{}", dep ))),
				[ OutputSpec::service( format!( "svc.{}", module ))],
			)],
		)).collect())
	}

	proptest! {
		#[test]
		fn resolution_is_deterministic_and_topological( declared in dag() ) {
			let names = ( 0..declared.len() ).map(| index | format!( "svc.{}", index ));
			let catalogue = catalogue( names );
			let registry = registry( declared.clone() );
			let first = resolve( &registry, &catalogue, &BTreeSet::new() ).expect( "acyclic" ).references();
			let second = resolve( &registry, &catalogue, &BTreeSet::new() ).expect( "acyclic" ).references();
			prop_assert_eq!( &first, &second );

			let position = first.iter().enumerate()
				.map(|( position, reference )| ( reference.module().to_string(), position ))
				.collect::<BTreeMap<_, _>>();
			for module in &declared {
				for input in &module.providers[ 0 ].inputs {
					let producer = format!( "m{}", input.kind.name().as_str().trim_start_matches( "svc." ));
					prop_assert!( position[ &producer ] < position[ module.config_type.as_str() ]);
				}
			}
		}
	}
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::any::Any;

use reactive_ecs::prelude::*;

fn setup_world() -> (World, ComponentTypeId, ComponentTypeId) {
    let mut world = World::new();
    let position = world
        .register_component(
            ComponentDesc::new("Position")
                .field("x", types::number())
                .field("y", types::number()),
        )
        .unwrap();
    let velocity = world
        .register_component(
            ComponentDesc::new("Velocity")
                .field("dx", types::number())
                .field("dy", types::number()),
        )
        .unwrap();
    (world, position, velocity)
}

fn bench_spawn(c: &mut Criterion) {
    c.bench_function("spawn_1000_entities", |b| {
        b.iter(|| {
            let (mut world, position, velocity) = setup_world();
            for _ in 0..1000 {
                let e = world.create_entity();
                world.add_component(e, position).unwrap();
                world.add_component(e, velocity).unwrap();
            }
            black_box(world.num_entities())
        })
    });
}

fn bench_query_reindex(c: &mut Criterion) {
    c.bench_function("reindex_toggle_1000", |b| {
        let (mut world, position, velocity) = setup_world();
        let qid = world
            .get_query(&[position.into(), velocity.into()])
            .unwrap();
        let entities: Vec<_> = (0..1000)
            .map(|_| {
                let e = world.create_entity();
                world.add_component(e, position).unwrap();
                e
            })
            .collect();

        b.iter(|| {
            for &e in &entities {
                world.add_component(e, velocity).unwrap();
            }
            for &e in &entities {
                world.remove_component_immediately(e, velocity).unwrap();
            }
            black_box(world.query_entities(qid).len())
        })
    });
}

struct Integrate {
    position: ComponentTypeId,
    velocity: ComponentTypeId,
}

impl System for Integrate {
    fn name(&self) -> &'static str {
        "Integrate"
    }

    fn query_defs(&self) -> Vec<(&'static str, QueryDef)> {
        vec![(
            "moving",
            QueryDef::new([
                QueryTerm::With(self.position),
                QueryTerm::With(self.velocity),
            ]),
        )]
    }

    fn execute(&mut self, world: &mut World, ctx: &SystemContext<'_>) -> Result<()> {
        let entities = ctx
            .queries
            .get("moving")
            .expect("declared query")
            .entities(world)
            .to_vec();
        for entity in entities {
            let dx = world
                .get_component(entity, self.velocity)
                .and_then(|v| v.get("dx").ok()?.as_number())
                .unwrap_or(0.0);
            let data = world
                .get_mutable_component(entity, self.position)
                .expect("in query");
            let x = data.get("x")?.as_number().unwrap_or(0.0);
            data.set("x", Value::Number(x + dx * ctx.delta as f64))?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn bench_tick(c: &mut Criterion) {
    c.bench_function("tick_1000_moving", |b| {
        let (mut world, position, velocity) = setup_world();
        world.register_system(Integrate { position, velocity }).unwrap();
        for _ in 0..1000 {
            let e = world.create_entity();
            world
                .add_component_with(e, position, [("x", Value::Number(0.0))])
                .unwrap();
            world
                .add_component_with(e, velocity, [("dx", Value::Number(1.0))])
                .unwrap();
        }

        b.iter(|| world.execute(Some(0.016), None).unwrap())
    });
}

criterion_group!(benches, bench_spawn, bench_query_reindex, bench_tick);
criterion_main!(benches);

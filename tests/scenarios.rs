use cash_pdp_solver::fitness::{CostModel, FitnessEvaluator};
use cash_pdp_solver::heuristics::{
    solve, NearestFeasible, RandomizedWeights, SearchController, SolutionBuilder, SolverOptions, StrategyKind,
};
use cash_pdp_solver::instance::ProblemInstance;
use cash_pdp_solver::parameters::RoutingParameters;
use cash_pdp_solver::random::RandomSource;

fn small_matrix() -> Vec<Vec<f64>> {
    vec![
        vec![0.0, 10.0, 20.0, 30.0],
        vec![10.0, 0.0, 15.0, 25.0],
        vec![20.0, 15.0, 0.0, 12.0],
        vec![30.0, 25.0, 12.0, 0.0],
    ]
}

fn routes(outcome: &cash_pdp_solver::heuristics::SearchOutcome) -> Vec<Vec<usize>> {
    outcome.best.as_ref().unwrap().routes().map(|r| r.to_vec()).collect()
}

#[test]
fn test_single_vehicle_serves_everything() {
    let params = RoutingParameters {
        vehicle_count: 1,
        vehicle_capacity: 100,
        vehicle_max_distance: 1e9,
        depot_max_stock: 1000,
        max_iterations: 20,
        ..Default::default()
    };
    let instance = ProblemInstance::new("a", vec![0, 50, -30, 20], small_matrix(), &params).unwrap();

    for kind in StrategyKind::all() {
        let options = SolverOptions { strategy: kind, ..Default::default() };
        let outcome = solve(&instance, &params, &options);
        let best = outcome.best.as_ref().unwrap();

        assert!(best.unserved().is_empty(), "{} left nodes unserved", kind);
        let mut served = best.vehicle(0).route().to_vec();
        served.sort();
        assert_eq!(served, vec![1, 2, 3]);

        // four hops: depot, three services, depot
        let hops = instance.route_length(best.vehicle(0).route());
        assert!((best.total_distance() - hops).abs() < 1e-9);
        assert_eq!(best.storage_cost(), CostModel::default().base_storage_cost);
        assert!(best.validate(&instance, &params).is_ok());
    }
}

#[test]
fn test_oversized_demand_stays_unserved() {
    let m = small_matrix();
    let params = RoutingParameters {
        vehicle_count: 5,
        vehicle_capacity: 10,
        vehicle_max_distance: 1e9,
        depot_max_stock: 1000,
        max_iterations: 10,
        ..Default::default()
    };
    let instance = ProblemInstance::new("b", vec![0, 50, -5, 3], m, &params).unwrap();

    for seed in 0..10 {
        let params = RoutingParameters { random_seed: seed, ..params.clone() };
        let outcome = solve(&instance, &params, &SolverOptions::default());
        let best = outcome.best.unwrap();
        assert!(best.unserved().contains(&1));
        assert!(best.routes().all(|r| !r.contains(&1)));
        assert_eq!(best.unserved().len(), 1);
    }
}

#[test]
fn test_single_iteration_keeps_its_fitness() {
    let params = RoutingParameters {
        vehicle_count: 3,
        vehicle_capacity: 1400,
        vehicle_max_distance: 250.0,
        depot_max_stock: 5000,
        max_iterations: 1,
        random_seed: 31,
        ..Default::default()
    };
    let instance = ProblemInstance::random(12, &params, 4).unwrap();

    let strategy = RandomizedWeights::new();
    let builder = SolutionBuilder::new(&instance, &params, &strategy);
    let evaluator = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);
    let outcome = SearchController::new(builder, evaluator, &params).run();

    assert_eq!(outcome.iterations, 1);
    assert_eq!(outcome.best_fitness(), outcome.fitness_history[0]);

    // same seed, one build by hand
    let builder = SolutionBuilder::new(&instance, &params, &strategy);
    let mut single = builder.build(&mut RandomSource::new(params.random_seed));
    let evaluator = FitnessEvaluator::new(CostModel::default(), params.depot_max_stock);
    let score = evaluator.evaluate(&mut single);
    assert_eq!(outcome.best_fitness(), score.fitness);
}

#[test]
fn test_same_seed_same_result() {
    let params = RoutingParameters {
        vehicle_count: 4,
        vehicle_capacity: 1200,
        vehicle_max_distance: 300.0,
        depot_max_stock: 5000,
        max_iterations: 15,
        random_seed: 12345678,
        ..Default::default()
    };
    let instance = ProblemInstance::random(20, &params, 1).unwrap();

    let a = solve(&instance, &params, &SolverOptions::default());
    let b = solve(&instance, &params, &SolverOptions::default());
    assert_eq!(a.fitness_history, b.fitness_history);
    assert_eq!(routes(&a), routes(&b));

    let parallel = SolverOptions { workers: 3, ..Default::default() };
    let c = solve(&instance, &params, &parallel);
    let d = solve(&instance, &params, &parallel);
    assert_eq!(c.iterations, 15);
    assert_eq!(routes(&c), routes(&d));
    assert_eq!(c.best_fitness(), d.best_fitness());
}

#[test]
fn test_nearest_is_seed_independent() {
    let params = RoutingParameters {
        vehicle_count: 2,
        vehicle_capacity: 60,
        vehicle_max_distance: 1000.0,
        depot_max_stock: 1000,
        ..Default::default()
    };
    let instance = ProblemInstance::new("n", vec![0, 50, -30, 20], small_matrix(), &params).unwrap();
    let builder = SolutionBuilder::new(&instance, &params, &NearestFeasible);

    let a = builder.build(&mut RandomSource::new(1));
    let b = builder.build(&mut RandomSource::new(2));
    assert_eq!(a.vehicle(0).route(), b.vehicle(0).route());
    assert_eq!(a.vehicle(1).route(), b.vehicle(1).route());
}

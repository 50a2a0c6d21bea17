//! AC-OPF end-to-end tests on small meshed and radial cases

use gat_core::{Branch, BranchId, Bus, BusId, CostModel, Gen, GenId, Network};
use gat_opf::{Formulation, OpfSolver, SolveStatus};

fn assert_close(actual: f64, expected: f64, tol: f64, what: &str) {
    assert!(
        (actual - expected).abs() < tol,
        "{what}: expected {expected}, got {actual}"
    );
}

fn ac_solver() -> OpfSolver {
    OpfSolver::new().with_formulation(Formulation::Ac)
}

/// Three buses in a ring with resistive lines and line charging.
fn meshed() -> Network {
    let mut network = Network::new("ac-ring");
    network
        .add_bus(
            Bus::new(BusId::new(1), "north")
                .as_reference()
                .with_voltage_limits(0.95, 1.05),
        )
        .unwrap();
    network
        .add_bus(
            Bus::new(BusId::new(2), "east")
                .with_demand(30.0, 10.0)
                .with_voltage_limits(0.95, 1.05),
        )
        .unwrap();
    network
        .add_bus(
            Bus::new(BusId::new(3), "south")
                .with_demand(150.0, 40.0)
                .with_shunt(0.0, 10.0)
                .with_voltage_limits(0.95, 1.05),
        )
        .unwrap();
    for (k, (f, t)) in [(1, 2), (2, 3), (1, 3)].into_iter().enumerate() {
        network
            .add_branch(
                Branch::new(
                    BranchId::new(k + 1),
                    format!("{f}-{t}"),
                    BusId::new(f),
                    BusId::new(t),
                    0.01,
                    0.1,
                )
                .with_charging(0.02),
            )
            .unwrap();
    }
    network
        .add_gen(
            Gen::new(GenId::new(1), "G1", BusId::new(1))
                .with_p_limits(0.0, 250.0)
                .with_q_limits(-100.0, 150.0)
                .with_cost(CostModel::quadratic(0.0, 10.0, 0.01)),
        )
        .unwrap();
    network
        .add_gen(
            Gen::new(GenId::new(2), "G2", BusId::new(2))
                .with_p_limits(0.0, 150.0)
                .with_q_limits(-100.0, 100.0)
                .with_cost(CostModel::quadratic(0.0, 12.0, 0.02)),
        )
        .unwrap();
    network
}

/// Cheap unit behind a rated line, expensive unit at the load.
fn radial(rate_mva: f64) -> Network {
    let mut network = Network::new("ac-radial");
    network.add_bus(Bus::new(BusId::new(1), "export").as_reference()).unwrap();
    network
        .add_bus(Bus::new(BusId::new(2), "import").with_demand(150.0, 20.0))
        .unwrap();
    network
        .add_branch(
            Branch::new(BranchId::new(1), "tie", BusId::new(1), BusId::new(2), 0.01, 0.1)
                .with_rate_a(rate_mva),
        )
        .unwrap();
    for (id, bus, price) in [(1, 1, 10.0), (2, 2, 30.0)] {
        network
            .add_gen(
                Gen::new(GenId::new(id), format!("g{id}"), BusId::new(bus))
                    .with_p_limits(0.0, 200.0)
                    .with_q_limits(-100.0, 100.0)
                    .with_cost(CostModel::linear(0.0, price)),
            )
            .unwrap();
    }
    network
}

#[test]
fn meshed_case_respects_limits_and_has_losses() {
    let mut network = meshed();
    let result = ac_solver().solve(&mut network).unwrap();
    assert_eq!(result.status, SolveStatus::Converged);
    assert_eq!(result.formulation, Formulation::Ac);

    for bus in &network.buses {
        let v = bus.voltage.value();
        assert!(
            v >= bus.v_min.value() - 1e-6 && v <= bus.v_max.value() + 1e-6,
            "bus {:?} voltage {v} outside limits",
            bus.id
        );
        assert!(bus.mu_vmin >= 0.0 && bus.mu_vmax >= 0.0);
    }
    assert_close(network.buses[0].angle.value(), 0.0, 1e-8, "reference angle");

    for gen in &network.gens {
        let (p, q) = (gen.p.value(), gen.q.value());
        assert!(p >= gen.pmin.value() - 1e-2 && p <= gen.pmax.value() + 1e-2);
        assert!(q >= gen.qmin.value() - 1e-2 && q <= gen.qmax.value() + 1e-2);
    }

    let losses = network.total_generation().value() - network.total_demand().value();
    assert!(losses > 0.1, "losses {losses}");
    assert!(losses < 10.0, "losses {losses}");
    for branch in &network.branches {
        assert!(branch.p_from.value() + branch.p_to.value() > 0.0);
    }
    assert_close(network.total_cost(), result.objective, 1e-3, "objective");
}

#[test]
fn meshed_case_balances_active_and_reactive_power() {
    let mut network = meshed();
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());

    let index = network.bus_index_map();
    let mut p: Vec<f64> = network.buses.iter().map(|b| -b.p_demand.value()).collect();
    let mut q: Vec<f64> = network.buses.iter().map(|b| -b.q_demand.value()).collect();
    for (k, bus) in network.buses.iter().enumerate() {
        let v2 = bus.voltage.value().powi(2);
        p[k] -= bus.g_shunt.value() * v2;
        q[k] += bus.b_shunt.value() * v2;
    }
    for gen in &network.gens {
        p[index[&gen.bus]] += gen.p.value();
        q[index[&gen.bus]] += gen.q.value();
    }
    for branch in &network.branches {
        let (f, t) = (index[&branch.from_bus], index[&branch.to_bus]);
        p[f] -= branch.p_from.value();
        q[f] -= branch.q_from.value();
        p[t] -= branch.p_to.value();
        q[t] -= branch.q_to.value();
    }
    for k in 0..network.buses.len() {
        assert_close(p[k], 0.0, 1e-3, &format!("bus {k} active balance"));
        assert_close(q[k], 0.0, 1e-3, &format!("bus {k} reactive balance"));
    }
}

#[test]
fn losses_make_ac_dearer_than_dc() {
    let mut ac = meshed();
    let mut dc = meshed();
    let ac_result = ac_solver().solve(&mut ac).unwrap();
    let dc_result = OpfSolver::new().solve(&mut dc).unwrap();
    assert!(ac_result.is_converged() && dc_result.is_converged());
    assert!(ac_result.objective > dc_result.objective);
    // delivered energy is dearer at the far end of the network
    assert!(ac.buses[2].p_lambda > ac.buses[0].p_lambda);
    for (a, d) in ac.gens.iter().zip(&dc.gens) {
        assert_close(a.p.value(), d.p.value(), 25.0, "dispatch");
    }
}

#[test]
fn apparent_power_limit_binds() {
    let mut network = radial(100.0);
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());

    let tie = &network.branches[0];
    let s_from = tie.p_from.value().hypot(tie.q_from.value());
    let s_to = tie.p_to.value().hypot(tie.q_to.value());
    assert_close(s_from.max(s_to), 100.0, 1e-2, "tie loading");
    assert!(tie.mu_s_from >= 0.0 && tie.mu_s_to >= 0.0);
    assert!(tie.mu_s_from + tie.mu_s_to > 1.0, "rating multipliers");
    assert!(network.buses[1].p_lambda > network.buses[0].p_lambda + 10.0);
    assert!(network.gens[1].p.value() > 50.0);
}

#[test]
fn unlimited_line_imports_everything() {
    let mut network = radial(0.0);
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());
    assert_close(network.gens[1].p.value(), 0.0, 1e-2, "expensive unit");
    assert!(network.gens[0].p.value() > 150.0);
    assert_eq!(network.branches[0].mu_s_from, 0.0);
}

#[test]
fn dispatchable_load_keeps_its_power_factor() {
    let mut network = radial(0.0);
    network.gens[1] = Gen::new(GenId::new(2), "flexible load", BusId::new(2))
        .with_p_limits(-50.0, 0.0)
        .with_q_limits(-10.0, 0.0)
        .with_cost(CostModel::linear(0.0, 40.0));
    network.gens[0].pmax = gat_core::Megawatts(300.0);
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());

    let load = &network.gens[1];
    assert!(load.is_dispatchable_load());
    assert_close(load.p.value(), -50.0, 1e-2, "served load");
    assert_close(load.q.value(), load.p.value() * 0.2, 1e-3, "constant power factor");
}

#[test]
fn demand_above_capacity_is_infeasible() {
    let mut network = meshed();
    network.buses[2].p_demand = gat_core::Megawatts(500.0);
    let result = ac_solver().solve(&mut network).unwrap();
    assert_eq!(result.status, SolveStatus::Infeasible);
    assert_eq!(result.iterations, 0);
    assert_eq!(network.gens[0].q.value(), 0.0);
}

#[test]
fn piecewise_linear_cost_in_ac() {
    let mut network = meshed();
    network.gens[1].cost_model =
        CostModel::piecewise_linear(vec![(0.0, 0.0), (60.0, 660.0), (150.0, 2100.0)]);
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());
    assert_close(network.total_cost(), result.objective, 1e-2, "curve value at dispatch");
}

#[test]
fn reactive_limit_multiplier_matches_reactive_price() {
    let mut network = meshed();
    network.gens[1].qmax = gat_core::Megavars(5.0);
    let result = ac_solver().solve(&mut network).unwrap();
    assert!(result.is_converged());

    let capped = &network.gens[1];
    assert_close(capped.q.value(), 5.0, 1e-2, "capped Q");
    assert!(capped.mu_qmax > 1e-3, "mu_qmax {}", capped.mu_qmax);
    assert_close(capped.mu_qmax, network.buses[1].q_lambda, 1e-3, "mu_qmax vs q_lambda");
    assert_close(capped.mu_qmin, 0.0, 1e-4, "capped mu_qmin");

    let free = &network.gens[0];
    assert!(free.q.value() > free.qmin.value() + 1.0 && free.q.value() < free.qmax.value() - 1.0);
    assert_close(free.mu_qmin, 0.0, 1e-4, "G1 mu_qmin");
    assert_close(free.mu_qmax, 0.0, 1e-4, "G1 mu_qmax");

    for bus in &network.buses {
        let v = bus.voltage.value();
        if v > bus.v_min.value() + 1e-3 {
            assert_close(bus.mu_vmin, 0.0, 1e-4, &format!("bus {:?} mu_vmin", bus.id));
        }
        if v < bus.v_max.value() - 1e-3 {
            assert_close(bus.mu_vmax, 0.0, 1e-4, &format!("bus {:?} mu_vmax", bus.id));
        }
    }
}

#[test]
fn dead_spur_does_not_change_dispatch() {
    let mut reference = meshed();
    let expected = ac_solver().solve(&mut reference).unwrap();
    assert!(expected.is_converged());

    let mut network = meshed();
    network
        .add_bus(Bus::new(BusId::new(4), "spare").with_voltage_limits(0.95, 1.05))
        .unwrap();
    network
        .add_branch(
            Branch::new(BranchId::new(4), "3-4", BusId::new(3), BusId::new(4), 0.01, 0.1)
                .out_of_service(),
        )
        .unwrap();
    let result = ac_solver().solve(&mut network).unwrap();
    assert_eq!(result.status, SolveStatus::Converged);
    assert_close(result.objective, expected.objective, 1e-3, "objective");
    for (gen, base) in network.gens.iter().zip(&reference.gens) {
        assert_close(gen.p.value(), base.p.value(), 1e-3, "dispatch");
    }
    assert_eq!(network.buses[3].p_lambda, 0.0);
    assert_eq!(network.buses[3].q_lambda, 0.0);
}

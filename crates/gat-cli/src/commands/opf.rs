use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use gat_cli::cli::OpfCommands;
use gat_core::solver::LinearSolverKind;
use gat_core::{GenId, Network};
use gat_opf::{solve_with_decommitment, OpfSolver, SolveResult};
use serde::Serialize;
use tabwriter::TabWriter;
use tracing::info;

/// Commitment changes reported alongside the final solve
#[derive(Debug, Clone, Serialize)]
struct DecommitSummary {
    shut_down: Vec<GenId>,
    stages: usize,
}

/// JSON document printed by `--json`
#[derive(Debug, Serialize)]
struct OpfOutput<'a> {
    result: &'a SolveResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    decommitment: Option<&'a DecommitSummary>,
    network: &'a Network,
}

pub fn handle(command: &OpfCommands) -> Result<SolveResult> {
    let args = command.args();
    let formulation = command.formulation();
    let linear_solver = args.solver.parse::<LinearSolverKind>()?;
    let mut network = read_network(args.input.as_deref())?;
    info!(
        network = %network.name,
        buses = network.buses.len(),
        gens = network.gens.len(),
        "loaded network"
    );

    let solver =
        OpfSolver::with_options(args.options(formulation)).with_linear_solver(linear_solver);
    let (result, decommitment) = if args.decommit {
        let outcome = solve_with_decommitment(&mut network, &solver)
            .with_context(|| format!("running {formulation} OPF with decommitment"))?;
        let summary = DecommitSummary {
            shut_down: outcome.shut_down,
            stages: outcome.stages,
        };
        (outcome.result, Some(summary))
    } else {
        let result = solver
            .solve(&mut network)
            .with_context(|| format!("running {formulation} OPF"))?;
        (result, None)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        let output = OpfOutput {
            result: &result,
            decommitment: decommitment.as_ref(),
            network: &network,
        };
        serde_json::to_writer_pretty(&mut out, &output).context("writing JSON output")?;
        writeln!(out)?;
    } else {
        print_summary(&mut out, &network, &result, decommitment.as_ref())?;
    }
    Ok(result)
}

fn read_network(input: Option<&Path>) -> Result<Network> {
    let text = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("reading network from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading network from stdin")?;
            buffer
        }
    };
    if text.trim().is_empty() {
        bail!("empty input: no network snapshot received");
    }
    let network: Network = serde_json::from_str(&text).context("parsing network JSON")?;
    network.validate().context("validating network")?;
    Ok(network)
}

fn print_summary<W: Write>(
    out: &mut W,
    network: &Network,
    result: &SolveResult,
    decommitment: Option<&DecommitSummary>,
) -> Result<()> {
    writeln!(
        out,
        "{} OPF on {}: {} after {} iterations ({} ms)",
        result.formulation.to_string().to_uppercase(),
        network.name,
        result.status,
        result.iterations,
        result.solve_time_ms
    )?;
    writeln!(out, "Objective: {:.4} $/h", result.objective)?;
    if let Some(summary) = decommitment {
        let ids: Vec<String> = summary
            .shut_down
            .iter()
            .map(|id| id.value().to_string())
            .collect();
        writeln!(
            out,
            "Decommitment: {} stage(s), shut down [{}]",
            summary.stages,
            ids.join(", ")
        )?;
    }
    writeln!(out)?;

    let mut table = TabWriter::new(&mut *out);
    writeln!(table, "GEN\tNAME\tBUS\tSTATUS\tP (MW)\tQ (MVAR)\tMU_PMIN\tMU_PMAX")?;
    for gen in &network.gens {
        writeln!(
            table,
            "{}\t{}\t{}\t{}\t{:.3}\t{:.3}\t{:.4}\t{:.4}",
            gen.id.value(),
            gen.name,
            gen.bus.value(),
            if gen.status { "on" } else { "off" },
            gen.p.value(),
            gen.q.value(),
            gen.mu_pmin,
            gen.mu_pmax
        )?;
    }
    writeln!(table)?;
    writeln!(table, "BUS\tNAME\tVM (PU)\tVA (DEG)\tLMP ($/MWH)\tQ PRICE ($/MVARH)")?;
    for bus in &network.buses {
        writeln!(
            table,
            "{}\t{}\t{:.4}\t{:.4}\t{:.4}\t{:.4}",
            bus.id.value(),
            bus.name,
            bus.voltage.value(),
            bus.angle.to_degrees().value(),
            bus.p_lambda,
            bus.q_lambda
        )?;
    }
    let in_service: Vec<_> = network.branches.iter().filter(|b| b.status).collect();
    if !in_service.is_empty() {
        writeln!(table)?;
        writeln!(table, "BRANCH\tFROM\tTO\tP_FROM (MW)\tP_TO (MW)\tMU_S_FROM\tMU_S_TO")?;
        for branch in in_service {
            writeln!(
                table,
                "{}\t{}\t{}\t{:.3}\t{:.3}\t{:.4}\t{:.4}",
                branch.id.value(),
                branch.from_bus.value(),
                branch.to_bus.value(),
                branch.p_from.value(),
                branch.p_to.value(),
                branch.mu_s_from,
                branch.mu_s_to
            )?;
        }
    }
    table.flush()?;
    Ok(())
}

use resetloop_core::types::{format_timestamp, RunSummary};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn print_summary(summary: &RunSummary) {
    let rows: Vec<Vec<String>> = summary
        .results
        .iter()
        .map(|r| {
            vec![
                r.cycle.to_string(),
                r.duration_cell(),
                format_timestamp(&r.completed_at),
                r.anomaly_cell().to_string(),
                if r.setup_skipped { "yes" } else { "FAILED" }.to_string(),
            ]
        })
        .collect();

    println!();
    if rows.is_empty() {
        println!("No cycles completed.");
    } else {
        print_table(
            &["CYCLE", "DURATION (s)", "COMPLETED", "ANOMALY", "TEST MODE"],
            &rows,
        );
    }

    println!(
        "\n{}/{} cycles completed on {}, {} anomalous",
        summary.completed(),
        summary.cycles_requested,
        summary.serial,
        summary.anomalies()
    );
    if let Some(failure) = &summary.aborted {
        println!("Stopped at cycle {}: {}", failure.cycle, failure.reason);
    }
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.to_vec()));
    println!(
        "{}",
        widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}

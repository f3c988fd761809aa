//! Compile genetic code into a runnable circuit.

use helix_core::CircuitSpec;
use helix_registry::{Genome, Token};

/// Qubits used when the genome has no `qubits:` trait.
const DEFAULT_QUBITS: u32 = 2;
const MAX_QUBITS: u32 = 8;

/// Build an OpenQASM circuit from the gate identifiers in `genetic_code`.
///
/// Single-qubit gates walk the register round-robin, two-qubit gates act on
/// the current wire and its neighbour, and rotations take the next numeric
/// literal as their angle.
pub fn compile(genetic_code: &str) -> CircuitSpec {
    let genome = Genome::parse(genetic_code);
    let n = qubit_count(&genome);
    let tokens = genome.tokens();

    let mut qasm = format!(
        "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[{n}];\ncreg c[{n}];\n",
        n = n
    );
    let mut wire = 0u32;
    for (i, token) in tokens.iter().enumerate() {
        let Token::Ident(gate) = token else { continue };
        match gate.as_str() {
            "h" | "x" | "y" | "z" | "s" | "t" => {
                qasm.push_str(&format!("{} q[{}];\n", gate, wire % n));
            }
            "cx" | "cz" | "swap" if n > 1 => {
                qasm.push_str(&format!("{} q[{}],q[{}];\n", gate, wire % n, (wire + 1) % n));
            }
            "rx" | "ry" | "rz" => {
                let angle = next_number(&tokens[i + 1..]).unwrap_or("0");
                qasm.push_str(&format!("{}({}) q[{}];\n", gate, angle, wire % n));
            }
            _ => continue,
        }
        wire += 1;
    }
    qasm.push_str("measure q -> c;\n");
    CircuitSpec::from_qasm(qasm)
}

fn qubit_count(genome: &Genome) -> u32 {
    genome
        .trait_value("qubits")
        .and_then(|v| v.parse::<f64>().ok())
        .map(|v| (v.round() as u32).clamp(1, MAX_QUBITS))
        .unwrap_or(DEFAULT_QUBITS)
}

/// First number literal within a gate's argument list, e.g. `(0.5)`.
fn next_number(tokens: &[Token]) -> Option<&str> {
    if tokens.first() != Some(&Token::Symbol('(')) {
        return None;
    }
    tokens.iter().take(3).find_map(|t| match t {
        Token::Number(n) => Some(n.as_str()),
        _ => None,
    })
}

use crate::mealy::MealyMachine;

/// Something that can be rendered in the Graphviz DOT format. For more
/// information on DOT, see the [graphviz documentation](https://graphviz.org/doc/info/lang.html).
pub trait Dottable {
    /// Computes the DOT representation of `self`.
    fn dot_representation(&self) -> String;
}

impl Dottable for MealyMachine {
    /// Renders the reachable subgraph. States appear in BFS order and
    /// transitions in insertion order, so equal machines render to identical
    /// strings.
    fn dot_representation(&self) -> String {
        let mut lines = vec!["digraph {".to_string(), "  rankdir=LR;".to_string()];
        let reachable = self.reachable_states();
        for &state in &reachable {
            let shape = if state == self.initial() {
                "doublecircle"
            } else {
                "circle"
            };
            lines.push(format!(
                "  \"{}\" [shape={shape}];",
                sanitize(self.state_name(state))
            ));
        }
        for &state in &reachable {
            for transition in self.transitions_from(state) {
                lines.push(format!(
                    "  \"{}\" -> \"{}\" [label=\"{}/{}\"];",
                    sanitize(self.state_name(state)),
                    sanitize(self.state_name(transition.target)),
                    sanitize(&transition.input.to_string()),
                    sanitize(&transition.output.to_string()),
                ));
            }
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}

fn sanitize(ident: &str) -> String {
    ident.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{Alphabet, Letter};

    #[test]
    fn flip_flop_renders_to_expected_dot() {
        let mut machine = MealyMachine::new(Alphabet::new(['t']));
        let q0 = machine.add_state("ε");
        let q1 = machine.add_state("t");
        machine.add_transition(q0, Letter::from('t'), Letter::int(0), q1);
        machine.add_transition(q1, Letter::from('t'), Letter::int(1), q0);

        let expected = concat!(
            "digraph {\n",
            "  rankdir=LR;\n",
            "  \"ε\" [shape=doublecircle];\n",
            "  \"t\" [shape=circle];\n",
            "  \"ε\" -> \"t\" [label=\"t/0\"];\n",
            "  \"t\" -> \"ε\" [label=\"t/1\"];\n",
            "}"
        );
        assert_eq!(machine.dot_representation(), expected);
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let mut machine = MealyMachine::new(Alphabet::new(['a']));
        let q0 = machine.add_state("say \"hi\"");
        machine.add_transition(q0, Letter::from('a'), Letter::int(0), q0);
        assert!(machine
            .dot_representation()
            .contains("\"say \\\"hi\\\"\" [shape=doublecircle];"));
    }
}

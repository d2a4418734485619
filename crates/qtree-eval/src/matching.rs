//! Locating the extensionally best tree among ranked solutions.

use qtree_core::subsumes;
use qtree_learn::{EvaluatedTree, ExamplesSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestMatch {
    /// Position in the ranked list, 0 for the best returned solution.
    pub rank: usize,
    pub covered_correct: usize,
    pub covered_noise: usize,
}

/// Find the solution covering the most correct positives, then the fewest
/// noise positives. Earlier solutions win ties, and the first one covering
/// every correct positive and no noise positive ends the search.
pub fn best_matching(solutions: &[EvaluatedTree], examples: &ExamplesSet) -> Option<BestMatch> {
    let correct_total = examples.correct_positives().count();
    let mut best: Option<BestMatch> = None;

    for (rank, solution) in solutions.iter().enumerate() {
        let tree = solution.tree();
        let covered_correct = examples
            .correct_positives()
            .filter(|(_, t)| subsumes(tree, t))
            .count();
        let covered_noise = examples
            .noisy_positives()
            .filter(|(_, t)| subsumes(tree, t))
            .count();
        let candidate = BestMatch {
            rank,
            covered_correct,
            covered_noise,
        };

        if covered_noise == 0 && covered_correct == correct_total {
            return Some(candidate);
        }
        let better = best.map_or(true, |b| {
            (covered_correct, std::cmp::Reverse(covered_noise))
                > (b.covered_correct, std::cmp::Reverse(b.covered_noise))
        });
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtree_core::{Node, ResourceTree};
    use qtree_learn::Coverage;

    fn ex(s: &str) -> Node {
        Node::iri(format!("http://ex.org/{s}"))
    }

    fn typed(id: &str, class: &str) -> (Node, ResourceTree) {
        (
            ex(id),
            ResourceTree::new(ex(id)).with_child(Node::rdf_type(), ResourceTree::new(ex(class))),
        )
    }

    fn of_type(class: &str) -> EvaluatedTree {
        EvaluatedTree::new(
            ResourceTree::top().with_child(Node::rdf_type(), ResourceTree::new(ex(class))),
            0.0,
            Coverage::default(),
        )
    }

    fn examples() -> ExamplesSet {
        ExamplesSet::new(
            vec![typed("a", "Person"), typed("b", "Person"), typed("c", "Person")],
            vec![typed("n", "Dog")],
            vec![typed("x", "Cat"), typed("y", "Cat"), typed("z", "Cat")],
        )
        .expect("examples")
    }

    #[test]
    fn perfect_match_wins_even_when_ranked_late() {
        let solutions = vec![
            EvaluatedTree::new(ResourceTree::top(), 1.0, Coverage::default()),
            of_type("Dog"),
            of_type("Person"),
        ];
        let found = best_matching(&solutions, &examples()).expect("match");
        assert_eq!(
            found,
            BestMatch {
                rank: 2,
                covered_correct: 3,
                covered_noise: 0
            }
        );
    }

    #[test]
    fn more_correct_coverage_beats_less_noise() {
        let solutions = vec![
            of_type("Dog"),
            EvaluatedTree::new(ResourceTree::top(), 1.0, Coverage::default()),
        ];
        let found = best_matching(&solutions, &examples()).expect("match");
        assert_eq!(found.rank, 1);
        assert_eq!(found.covered_noise, 1);
    }

    #[test]
    fn no_solutions_no_match() {
        assert_eq!(best_matching(&[], &examples()), None);
    }
}

//! Structural complexity scoring for extracted nodes.

use tree_sitter::Node;

use crate::languages::Lang;

const DEPTH_WEIGHT: f64 = 0.3;
const BRANCH_WEIGHT: f64 = 0.4;
const LINES_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Metrics {
    /// Deepest chain of nested control-flow constructs.
    pub max_depth: usize,
    pub branches: usize,
    pub lines: usize,
}

/// Weighted score in `0.0..=1.0`, rounded to two decimals.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn score(m: Metrics) -> f64 {
    let depth = (m.max_depth as f64 / 10.0).min(1.0) * DEPTH_WEIGHT;
    let branch = (m.branches as f64 / 10.0).min(1.0) * BRANCH_WEIGHT;
    let lines = (m.lines as f64 / 100.0).min(1.0) * LINES_WEIGHT;
    ((depth + branch + lines) * 100.0).round() / 100.0
}

/// Walk `node` iteratively, counting control-flow nodes and their nesting.
pub(crate) fn measure(node: Node<'_>, lang: Lang) -> Metrics {
    let kinds = lang.branch_node_kinds();
    let mut metrics = Metrics {
        lines: node.end_position().row - node.start_position().row + 1,
        ..Metrics::default()
    };

    let mut stack = vec![(node, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        let depth = if kinds.contains(&current.kind()) {
            metrics.branches += 1;
            metrics.max_depth = metrics.max_depth.max(depth + 1);
            depth + 1
        } else {
            depth
        };

        let mut cursor = current.walk();
        for child in current.named_children(&mut cursor) {
            stack.push((child, depth));
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_metrics_score_zero() {
        assert!(score(Metrics::default()).abs() < f64::EPSILON);
    }

    #[test]
    fn saturated_metrics_score_one() {
        let m = Metrics {
            max_depth: 25,
            branches: 40,
            lines: 500,
        };
        assert!((score(m) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn weights_combine_and_round() {
        let m = Metrics {
            max_depth: 2,
            branches: 3,
            lines: 33,
        };
        // 0.06 + 0.12 + 0.099 = 0.279
        assert!((score(m) - 0.28).abs() < 1e-9);
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn measures_nested_python() {
        let source = "\
def f(xs):
    for x in xs:
        if x:
            while x:
                x -= 1
    if xs:
        pass
";
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&Lang::Python.grammar().unwrap())
            .unwrap();
        let tree = parser.parse(source, None).unwrap();
        let func = tree.root_node().named_child(0).unwrap();

        let m = measure(func, Lang::Python);
        assert_eq!(m.branches, 4);
        assert_eq!(m.max_depth, 3);
        assert_eq!(m.lines, 7);
    }
}

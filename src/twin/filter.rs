//! Twin filter compilation
//!
//! Splits a twin-selection expression into the portion the digital-twin
//! store can evaluate natively (a graph-query string) and the portion
//! that must run client-side after candidates are fetched. The visitor
//! never fails: anything it cannot translate degrades to `ClientSide`,
//! `Forked` or `Unsupported` classification.
//!
//! Translation rules:
//! - a twin-id leaf matches on `twin.$dtId`
//! - a model-id leaf becomes `IS_OF_MODEL(twin,'<id>')`
//! - `UNDER(x)` becomes an ancestor graph traversal; OR-ed `UNDER`s
//!   collapse into one traversal with an `IN` list
//! - `[twinId].[modelId]` becomes a capability-relationship traversal
//! - AND/OR of translatable parts merge into one query, parenthesized
//!   exactly where precedence requires
//! - an AND mixing translatable and untranslatable conjuncts forks into a
//!   narrowing query plus a client residual; a mixed OR cannot narrow and
//!   goes wholly client-side

use serde::{Deserialize, Serialize};

use crate::expr::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::twin::model::{safe_id, TwinClassifier, TwinRefKind};

/// How a filter expression splits across the server/client boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterStatus {
    /// Fully translatable; the query alone selects the twins
    ServerSide,
    /// Nothing translatable; evaluate the residual per twin
    ClientSide,
    /// A narrowing query plus a client residual applied after fetch
    Forked,
    /// The expression cannot run on either side (temporal or failed
    /// sub-expressions, unresolvable graph calls)
    Unsupported,
}

/// Output of [`filter_twins`]; immutable once returned
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub status: FilterStatus,
    /// Graph query for the store, when any part is translatable
    pub server_query: Option<String>,
    /// The untranslatable remainder, for evaluation after fetch
    pub client_residual: Option<Expr>,
    /// The whole predicate with server leaves rewritten to their
    /// client-evaluable equivalents (`twin.$dtId == 'id'`,
    /// `IS_OF_MODEL(twin,'id')`, `UNDER(twin,...)`), for direct
    /// in-memory evaluation
    pub combined: Option<Expr>,
}

/// Caller-tunable behavior of the filter visitor
#[derive(Default)]
pub struct FilterOptions<'a> {
    /// A variable bound client-side (e.g. the loop variable of a
    /// FINDALL); references to it are never treated as twin ids
    pub client_variable: Option<&'a str>,
    /// Resolves symbolic `UNDER` arguments to concrete twin ids; when
    /// present it replaces literal-name extraction entirely
    pub resolver: Option<&'a dyn Fn(&Expr) -> Vec<String>>,
}

/// Split `expr` into server query and client residual
pub fn filter_twins(
    expr: &Expr,
    classifier: &dyn TwinClassifier,
    options: &FilterOptions,
) -> FilterResult {
    let part = visit(expr, classifier, options);
    let result = match part {
        Part::Server { server, rewritten } => FilterResult {
            status: FilterStatus::ServerSide,
            server_query: Some(render_query(&server)),
            client_residual: None,
            combined: Some(rewritten),
        },
        Part::Either(expr) | Part::Client(expr) => FilterResult {
            status: FilterStatus::ClientSide,
            server_query: None,
            client_residual: Some(expr.clone()),
            combined: Some(expr),
        },
        Part::Forked {
            server,
            residual,
            rewritten,
        } => FilterResult {
            status: FilterStatus::Forked,
            server_query: Some(render_query(&server)),
            client_residual: Some(residual),
            combined: Some(rewritten),
        },
        Part::Unsupported => FilterResult {
            status: FilterStatus::Unsupported,
            server_query: None,
            client_residual: None,
            combined: None,
        },
    };
    tracing::debug!(status = ?result.status, "classified twin filter");
    result
}

/// Server-translatable predicate fragment
#[derive(Debug, Clone)]
enum Pred {
    DtIdEq(String),
    IsOfModel(String),
    Not(Box<Pred>),
    And(Vec<Pred>),
    Or(Vec<Pred>),
}

/// Graph traversal clause; a query holds at most one
#[derive(Debug, Clone)]
enum MatchClause {
    /// `UNDER`: twins below any of these ancestors
    Ancestors(Vec<String>),
    /// Capability children of one twin
    Capability(String),
}

#[derive(Debug, Clone, Default)]
struct ServerPart {
    match_clause: Option<MatchClause>,
    predicate: Option<Pred>,
}

/// Classification of one sub-expression
enum Part {
    /// Constants usable on either side
    Either(Expr),
    /// Fully server-translatable; `rewritten` is the client-evaluable
    /// equivalent used to build the combined predicate
    Server { server: ServerPart, rewritten: Expr },
    /// Client-only
    Client(Expr),
    /// Server narrowing plus client residual
    Forked {
        server: ServerPart,
        residual: Expr,
        rewritten: Expr,
    },
    Unsupported,
}

fn visit(expr: &Expr, classifier: &dyn TwinClassifier, options: &FilterOptions) -> Part {
    match &expr.kind {
        ExprKind::Constant(_) => Part::Either(expr.clone()),

        ExprKind::Variable(name) => {
            if options.client_variable == Some(name.as_str()) {
                return Part::Client(expr.clone());
            }
            match classifier.classify(name) {
                TwinRefKind::ModelId => Part::Server {
                    server: ServerPart {
                        match_clause: None,
                        predicate: Some(Pred::IsOfModel(name.clone())),
                    },
                    rewritten: is_of_model_call(name),
                },
                TwinRefKind::TwinId => Part::Server {
                    server: ServerPart {
                        match_clause: None,
                        predicate: Some(Pred::DtIdEq(name.clone())),
                    },
                    rewritten: dt_id_equals(name),
                },
                TwinRefKind::Other => Part::Client(expr.clone()),
            }
        }

        ExprKind::Property { child, .. } => match visit(child, classifier, options) {
            Part::Server { server, .. } => match server {
                ServerPart {
                    match_clause: None,
                    predicate: Some(Pred::DtIdEq(id)),
                } => Part::Server {
                    server: ServerPart {
                        match_clause: Some(MatchClause::Capability(id)),
                        predicate: None,
                    },
                    rewritten: expr.clone(),
                },
                _ => Part::Unsupported,
            },
            Part::Client(_) | Part::Either(_) => Part::Client(expr.clone()),
            _ => Part::Unsupported,
        },

        ExprKind::Function { name, args } => {
            if name.eq_ignore_ascii_case("UNDER") {
                return visit_under(args, options);
            }
            Part::Client(expr.clone())
        }

        ExprKind::Temporal { .. } | ExprKind::Failed(_) => Part::Unsupported,

        ExprKind::Array(_) => Part::Client(expr.clone()),

        ExprKind::Unary { op, child } => {
            let part = visit(child, classifier, options);
            match op {
                UnaryOp::Not => match part {
                    Part::Server { server, rewritten } => match server.match_clause {
                        None => Part::Server {
                            server: ServerPart {
                                match_clause: None,
                                predicate: server
                                    .predicate
                                    .map(|pred| Pred::Not(Box::new(pred))),
                            },
                            rewritten: Expr::unary(UnaryOp::Not, rewritten),
                        },
                        // A negated graph traversal cannot narrow
                        Some(_) => Part::Client(Expr::unary(UnaryOp::Not, rewritten)),
                    },
                    Part::Client(inner) | Part::Either(inner) => {
                        Part::Client(Expr::unary(UnaryOp::Not, inner))
                    }
                    Part::Forked { rewritten, .. } => {
                        Part::Client(Expr::unary(UnaryOp::Not, rewritten))
                    }
                    Part::Unsupported => Part::Unsupported,
                },
                UnaryOp::Minus => match part {
                    Part::Client(_) | Part::Either(_) => Part::Client(expr.clone()),
                    _ => Part::Unsupported,
                },
            }
        }

        ExprKind::Binary { op, left, right } => {
            let l = visit(left, classifier, options);
            let r = visit(right, classifier, options);
            match op {
                BinaryOp::And => combine_and(l, r),
                BinaryOp::Or => combine_or(l, r),
                _ => {
                    // Arithmetic and comparisons are client work; anything
                    // unsupported below poisons the whole expression
                    if matches!(l, Part::Unsupported) || matches!(r, Part::Unsupported) {
                        Part::Unsupported
                    } else if matches!(l, Part::Either(_)) && matches!(r, Part::Either(_)) {
                        Part::Either(expr.clone())
                    } else {
                        Part::Client(expr.clone())
                    }
                }
            }
        }
    }
}

/// `UNDER(...)`: gather ancestor ids from literal names, an OR tree of
/// names, or the caller's resolver
fn visit_under(args: &[Expr], options: &FilterOptions) -> Part {
    let mut leaves = Vec::new();
    for arg in args {
        collect_or_leaves(arg, &mut leaves);
    }

    let mut ids = Vec::new();
    for leaf in &leaves {
        match options.resolver {
            Some(resolver) => ids.extend(resolver(leaf)),
            None => {
                if let ExprKind::Variable(name) = &leaf.kind {
                    ids.push(name.clone());
                }
            }
        }
    }

    if ids.is_empty() {
        return Part::Unsupported;
    }

    let rewritten = under_call(&ids);
    Part::Server {
        server: ServerPart {
            match_clause: Some(MatchClause::Ancestors(ids)),
            predicate: None,
        },
        rewritten,
    }
}

fn collect_or_leaves<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match &expr.kind {
        ExprKind::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            collect_or_leaves(left, out);
            collect_or_leaves(right, out);
        }
        _ => out.push(expr),
    }
}

/// Client-evaluable rewrite of a twin-id leaf: `twin.$dtId == "<id>"`
fn dt_id_equals(id: &str) -> Expr {
    Expr::property(Expr::variable("twin"), "$dtId").equals(Expr::text(id))
}

/// Client-evaluable rewrite of a model-id leaf
fn is_of_model_call(id: &str) -> Expr {
    Expr::function("IS_OF_MODEL", vec![Expr::variable("twin"), Expr::text(id)])
}

/// Client-evaluable rewrite of an `UNDER` traversal
fn under_call(ids: &[String]) -> Expr {
    let argument = if ids.len() == 1 {
        Expr::text(ids[0].clone())
    } else {
        Expr::array(ids.iter().map(|id| Expr::text(id.clone())).collect())
    };
    Expr::function("UNDER", vec![Expr::variable("twin"), argument])
}

/// Merge two server parts under AND; fails when both carry a graph
/// traversal (a query holds at most one MATCH)
fn merge_server_and(a: ServerPart, b: ServerPart) -> Option<ServerPart> {
    let match_clause = match (a.match_clause, b.match_clause) {
        (Some(_), Some(_)) => return None,
        (m, None) | (None, m) => m,
    };
    Some(ServerPart {
        match_clause,
        predicate: combine_preds(true, a.predicate, b.predicate),
    })
}

fn combine_preds(conjunction: bool, a: Option<Pred>, b: Option<Pred>) -> Option<Pred> {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => {
            let mut children = match (conjunction, a) {
                (true, Pred::And(children)) => children,
                (false, Pred::Or(children)) => children,
                (_, other) => vec![other],
            };
            match (conjunction, b) {
                (true, Pred::And(more)) => children.extend(more),
                (false, Pred::Or(more)) => children.extend(more),
                (_, other) => children.push(other),
            }
            Some(if conjunction {
                Pred::And(children)
            } else {
                Pred::Or(children)
            })
        }
    }
}

fn combine_and(l: Part, r: Part) -> Part {
    use Part::*;
    match (l, r) {
        (Unsupported, _) | (_, Unsupported) => Unsupported,

        (Either(a), Either(b)) => Either(a.and(b)),

        (Server { server: a, rewritten: ra }, Server { server: b, rewritten: rb }) => {
            match merge_server_and(a, b) {
                Some(server) => Server {
                    server,
                    rewritten: ra.and(rb),
                },
                None => Unsupported,
            }
        }

        (Server { server, rewritten }, Client(c) | Either(c)) => Forked {
            server,
            residual: c.clone(),
            rewritten: rewritten.and(c),
        },
        (Client(c) | Either(c), Server { server, rewritten }) => Forked {
            server,
            residual: c.clone(),
            rewritten: c.and(rewritten),
        },

        (Client(a) | Either(a), Client(b) | Either(b)) => Client(a.and(b)),

        (
            Forked {
                server: a,
                residual,
                rewritten: ra,
            },
            Server { server: b, rewritten: rb },
        ) => match merge_server_and(a, b) {
            Some(server) => Forked {
                server,
                residual,
                rewritten: ra.and(rb),
            },
            None => Unsupported,
        },
        (
            Server { server: a, rewritten: ra },
            Forked {
                server: b,
                residual,
                rewritten: rb,
            },
        ) => match merge_server_and(a, b) {
            Some(server) => Forked {
                server,
                residual,
                rewritten: ra.and(rb),
            },
            None => Unsupported,
        },

        (
            Forked {
                server,
                residual,
                rewritten: ra,
            },
            Client(c) | Either(c),
        ) => Forked {
            server,
            residual: residual.and(c.clone()),
            rewritten: ra.and(c),
        },
        (
            Client(c) | Either(c),
            Forked {
                server,
                residual,
                rewritten: rb,
            },
        ) => Forked {
            server,
            residual: c.clone().and(residual),
            rewritten: c.and(rb),
        },

        (
            Forked {
                server: a,
                residual: resa,
                rewritten: ra,
            },
            Forked {
                server: b,
                residual: resb,
                rewritten: rb,
            },
        ) => match merge_server_and(a, b) {
            Some(server) => Forked {
                server,
                residual: resa.and(resb),
                rewritten: ra.and(rb),
            },
            None => Unsupported,
        },
    }
}

fn combine_or(l: Part, r: Part) -> Part {
    use Part::*;
    match (l, r) {
        (Unsupported, _) | (_, Unsupported) => Unsupported,

        (Either(a), Either(b)) => Either(a.or(b)),

        (Server { server: a, rewritten: ra }, Server { server: b, rewritten: rb }) => {
            match (a.match_clause, b.match_clause) {
                // OR-ed ancestor traversals collapse into one IN query
                (Some(MatchClause::Ancestors(mut ids)), Some(MatchClause::Ancestors(more))) => {
                    ids.extend(more);
                    Server {
                        server: ServerPart {
                            match_clause: Some(MatchClause::Ancestors(ids)),
                            predicate: combine_preds(false, a.predicate, b.predicate),
                        },
                        rewritten: ra.or(rb),
                    }
                }
                (None, None) => Server {
                    server: ServerPart {
                        match_clause: None,
                        predicate: combine_preds(false, a.predicate, b.predicate),
                    },
                    rewritten: ra.or(rb),
                },
                // Incompatible traversals: evaluate the union client-side
                _ => Client(ra.or(rb)),
            }
        }

        // A server query cannot narrow a union with client work
        (Server { rewritten, .. }, Client(c) | Either(c)) => Client(rewritten.or(c)),
        (Client(c) | Either(c), Server { rewritten, .. }) => Client(c.or(rewritten)),
        (Forked { rewritten: ra, .. }, Server { rewritten: rb, .. })
        | (Server { rewritten: ra, .. }, Forked { rewritten: rb, .. }) => Client(ra.or(rb)),
        (Forked { rewritten: ra, .. }, Client(b) | Either(b)) => Client(ra.or(b)),
        (Client(a) | Either(a), Forked { rewritten: rb, .. }) => Client(a.or(rb)),
        (Forked { rewritten: ra, .. }, Forked { rewritten: rb, .. }) => Client(ra.or(rb)),

        (Client(a) | Either(a), Client(b) | Either(b)) => Client(a.or(b)),
    }
}

/// Render the graph query for a server part, in the store's dialect
fn render_query(server: &ServerPart) -> String {
    const ANCESTOR_EDGES: &str =
        ":isPartOf|isContainedIn|locatedIn|isCapabilityOf|includedIn*..5";

    match (&server.match_clause, &server.predicate) {
        (None, Some(pred)) => {
            format!("SELECT * FROM DIGITALTWINS twin WHERE {}", render_pred(pred))
        }
        (None, None) => "SELECT * FROM DIGITALTWINS twin".to_string(),
        (Some(MatchClause::Ancestors(ids)), pred) => {
            let condition = if ids.len() == 1 {
                format!("ancestor.$dtId = '{}'", safe_id(&ids[0]))
            } else {
                format!(
                    "ancestor.$dtId IN [{}]",
                    ids.iter()
                        .map(|id| format!("'{}'", safe_id(id)))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            let mut query = format!(
                "SELECT TOP (1001) twin,ancestor FROM DIGITALTWINS MATCH (twin)-[{}]->(ancestor) WHERE {}",
                ANCESTOR_EDGES, condition
            );
            if let Some(pred) = pred {
                query.push_str(" AND ");
                query.push_str(&render_operand(pred));
            }
            query
        }
        (Some(MatchClause::Capability(id)), pred) => {
            let mut query = format!(
                "SELECT TOP (1001) child,twin FROM DIGITALTWINS MATCH (child)<-[:isCapabilityOf]-(twin) WHERE twin.$dtId == '{}'",
                safe_id(id)
            );
            if let Some(pred) = pred {
                query.push_str(" AND ");
                query.push_str(&render_operand(pred));
            }
            query
        }
    }
}

fn render_pred(pred: &Pred) -> String {
    match pred {
        Pred::DtIdEq(id) => format!("twin.$dtId == '{}'", safe_id(id)),
        Pred::IsOfModel(id) => format!("IS_OF_MODEL(twin,'{}')", safe_id(id)),
        Pred::Not(inner) => format!("NOT {}", render_operand(inner)),
        Pred::And(children) => children
            .iter()
            .map(render_operand)
            .collect::<Vec<_>>()
            .join(" AND "),
        // AND binds tighter, so OR children render bare
        Pred::Or(children) => children
            .iter()
            .map(render_pred)
            .collect::<Vec<_>>()
            .join(" OR "),
    }
}

/// Render with parentheses exactly where precedence requires them
fn render_operand(pred: &Pred) -> String {
    match pred {
        Pred::Or(_) => format!("({})", render_pred(pred)),
        _ => render_pred(pred),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use crate::twin::model::DefaultClassifier;

    fn filter(source: &str) -> FilterResult {
        let expr = parse(source).unwrap();
        filter_twins(&expr, &DefaultClassifier, &FilterOptions::default())
    }

    #[test]
    fn test_twin_id_leaf_is_server_side() {
        let result = filter("[MS-PS-B122]");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some("SELECT * FROM DIGITALTWINS twin WHERE twin.$dtId == 'MS-PS-B122'")
        );
        assert!(result.client_residual.is_none());
        assert_eq!(
            result.combined.unwrap().serialize(),
            "twin.$dtId == \"MS-PS-B122\""
        );
    }

    #[test]
    fn test_model_id_leaf_is_of_model() {
        let result = filter("[dtmi:com:example:AirHandlingUnit;1]");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT * FROM DIGITALTWINS twin WHERE IS_OF_MODEL(twin,'dtmi:com:example:AirHandlingUnit;1')"
            )
        );
    }

    #[test]
    fn test_under_single_ancestor() {
        let result = filter("UNDER([MS-PS-B122])");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT TOP (1001) twin,ancestor FROM DIGITALTWINS MATCH (twin)-[:isPartOf|isContainedIn|locatedIn|isCapabilityOf|includedIn*..5]->(ancestor) WHERE ancestor.$dtId = 'MS-PS-B122'"
            )
        );
    }

    #[test]
    fn test_or_of_unders_collapses_to_in() {
        let result = filter("UNDER([MS-PS-B122]) | UNDER([MS-PS-B121])");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT TOP (1001) twin,ancestor FROM DIGITALTWINS MATCH (twin)-[:isPartOf|isContainedIn|locatedIn|isCapabilityOf|includedIn*..5]->(ancestor) WHERE ancestor.$dtId IN ['MS-PS-B122', 'MS-PS-B121']"
            )
        );
    }

    #[test]
    fn test_under_or_argument_collapses_too() {
        let result = filter("UNDER([MS-PS-B122] | [MS-PS-B121])");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert!(result
            .server_query
            .unwrap()
            .ends_with("ancestor.$dtId IN ['MS-PS-B122', 'MS-PS-B121']"));
    }

    #[test]
    fn test_capability_child_access() {
        let result = filter("[MS-PS-B122].[dtmi:com:example:ZoneAirTemperatureSensor;1]");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT TOP (1001) child,twin FROM DIGITALTWINS MATCH (child)<-[:isCapabilityOf]-(twin) WHERE twin.$dtId == 'MS-PS-B122'"
            )
        );
    }

    #[test]
    fn test_and_of_server_parts_merges() {
        let result = filter("[dtmi:com:example:Zone;1] & [MS-PS-B122]");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT * FROM DIGITALTWINS twin WHERE IS_OF_MODEL(twin,'dtmi:com:example:Zone;1') AND twin.$dtId == 'MS-PS-B122'"
            )
        );
    }

    #[test]
    fn test_or_inside_and_keeps_parentheses() {
        let result = filter("([MS-PS-B122] | [MS-PS-B121]) & [dtmi:com:example:Zone;1]");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT * FROM DIGITALTWINS twin WHERE (twin.$dtId == 'MS-PS-B122' OR twin.$dtId == 'MS-PS-B121') AND IS_OF_MODEL(twin,'dtmi:com:example:Zone;1')"
            )
        );
    }

    #[test]
    fn test_mixed_and_forks() {
        let result = filter("[dtmi:com:example:Zone;1] & this.capacity > 5");
        assert_eq!(result.status, FilterStatus::Forked);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT * FROM DIGITALTWINS twin WHERE IS_OF_MODEL(twin,'dtmi:com:example:Zone;1')"
            )
        );
        assert_eq!(
            result.client_residual.unwrap().serialize(),
            "(this.capacity) > 5"
        );
        assert_eq!(
            result.combined.unwrap().serialize(),
            "IS_OF_MODEL(twin,\"dtmi:com:example:Zone;1\") & (this.capacity) > 5"
        );
    }

    #[test]
    fn test_client_only_expression() {
        let result = filter("this.capacity > 5");
        assert_eq!(result.status, FilterStatus::ClientSide);
        assert!(result.server_query.is_none());
        assert_eq!(
            result.client_residual.unwrap().serialize(),
            "(this.capacity) > 5"
        );
    }

    #[test]
    fn test_mixed_or_degrades_to_client() {
        let result = filter("[MS-PS-B122] | this.capacity > 5");
        assert_eq!(result.status, FilterStatus::ClientSide);
        assert!(result.server_query.is_none());
        assert_eq!(
            result.combined.unwrap().serialize(),
            "twin.$dtId == \"MS-PS-B122\" | (this.capacity) > 5"
        );
    }

    #[test]
    fn test_temporal_is_unsupported() {
        let result = filter("AVERAGE([zone_temp], 5h) > 20");
        assert_eq!(result.status, FilterStatus::Unsupported);
        assert!(result.server_query.is_none());
        assert!(result.combined.is_none());
    }

    #[test]
    fn test_failed_is_unsupported() {
        let result = filter("FAILED([x]) | [MS-PS-B122]");
        assert_eq!(result.status, FilterStatus::Unsupported);
    }

    #[test]
    fn test_under_with_resolver() {
        let expr = parse("UNDER(site)").unwrap();
        let resolver = |_: &Expr| vec!["B-1".to_string(), "B-2".to_string()];
        let options = FilterOptions {
            client_variable: None,
            resolver: Some(&resolver),
        };
        let result = filter_twins(&expr, &DefaultClassifier, &options);
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert!(result
            .server_query
            .unwrap()
            .ends_with("ancestor.$dtId IN ['B-1', 'B-2']"));
    }

    #[test]
    fn test_client_variable_forces_client_side() {
        let expr = parse("item & [MS-PS-B122]").unwrap();
        let options = FilterOptions {
            client_variable: Some("item"),
            resolver: None,
        };
        let result = filter_twins(&expr, &DefaultClassifier, &options);
        assert_eq!(result.status, FilterStatus::Forked);
        assert_eq!(result.client_residual.unwrap().serialize(), "item");
    }

    #[test]
    fn test_quote_escaping_in_query() {
        let result = filter("[O'Hare-T1]");
        assert_eq!(
            result.server_query.as_deref(),
            Some("SELECT * FROM DIGITALTWINS twin WHERE twin.$dtId == 'O\\'Hare-T1'")
        );
    }

    #[test]
    fn test_negated_predicate_stays_server_side() {
        let result = filter("!([dtmi:com:example:Zone;1])");
        assert_eq!(result.status, FilterStatus::ServerSide);
        assert_eq!(
            result.server_query.as_deref(),
            Some(
                "SELECT * FROM DIGITALTWINS twin WHERE NOT IS_OF_MODEL(twin,'dtmi:com:example:Zone;1')"
            )
        );
    }

    #[test]
    fn test_negated_traversal_goes_client_side() {
        let result = filter("!UNDER([MS-PS-B122])");
        assert_eq!(result.status, FilterStatus::ClientSide);
        assert_eq!(
            result.combined.unwrap().serialize(),
            "!UNDER(twin,\"MS-PS-B122\")"
        );
    }

    #[test]
    fn test_two_traversals_anded_unsupported() {
        let result = filter("UNDER([A-1]) & UNDER([B-2])");
        assert_eq!(result.status, FilterStatus::Unsupported);
    }
}

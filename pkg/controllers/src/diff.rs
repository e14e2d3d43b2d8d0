//! Desired vs installed rule comparison.

use pkg_loxilb::{LoadBalancerEndpoint, LoadBalancerModel};

/// Same number of endpoints and the same (address, port) pairs, in any order.
/// Weights are not compared.
pub fn endpoints_equal(a: &[LoadBalancerEndpoint], b: &[LoadBalancerEndpoint]) -> bool {
    let contains = |set: &[LoadBalancerEndpoint], ep: &LoadBalancerEndpoint| {
        set.iter()
            .any(|e| e.endpoint_ip == ep.endpoint_ip && e.target_port == ep.target_port)
    };
    a.len() == b.len() && a.iter().all(|ep| contains(b, ep)) && b.iter().all(|ep| contains(a, ep))
}

/// Whether `installed` already satisfies `desired`.
pub fn is_converged(desired: &LoadBalancerModel, installed: &LoadBalancerModel) -> bool {
    desired.name() == installed.name() && endpoints_equal(&desired.endpoints, &installed.endpoints)
}

/// Desired rules with no converged counterpart in `snapshot`, in their original order.
pub fn rules_to_create<'a>(
    desired: &'a [LoadBalancerModel],
    snapshot: &[LoadBalancerModel],
) -> Vec<&'a LoadBalancerModel> {
    desired
        .iter()
        .filter(|d| !snapshot.iter().any(|s| is_converged(d, s)))
        .collect()
}

/// Names among `owned` that are installed but no longer desired.
pub fn stale_names(
    owned: &[String],
    desired: &[LoadBalancerModel],
    snapshot: &[LoadBalancerModel],
) -> Vec<String> {
    owned
        .iter()
        .filter(|name| snapshot.iter().any(|s| s.name() == name.as_str()))
        .filter(|name| !desired.iter().any(|d| d.name() == name.as_str()))
        .cloned()
        .collect()
}

/// Whether any of `names` is installed.
pub fn any_installed(names: &[String], snapshot: &[LoadBalancerModel]) -> bool {
    snapshot.iter().any(|s| names.iter().any(|n| n == s.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_loxilb::LoadBalancerService;

    fn ep(ip: &str, port: u16, weight: u8) -> LoadBalancerEndpoint {
        LoadBalancerEndpoint {
            endpoint_ip: ip.to_string(),
            target_port: port,
            weight,
            state: String::new(),
        }
    }

    fn model(name: &str, endpoints: Vec<LoadBalancerEndpoint>) -> LoadBalancerModel {
        LoadBalancerModel {
            service: LoadBalancerService {
                name: name.to_string(),
                port: 80,
                protocol: "tcp".to_string(),
                ..Default::default()
            },
            endpoints,
        }
    }

    #[test]
    fn test_order_independent_equality() {
        let a = vec![ep("10.0.0.5", 8080, 1), ep("10.0.0.6", 8080, 1)];
        let b = vec![ep("10.0.0.6", 8080, 1), ep("10.0.0.5", 8080, 0)];
        assert!(endpoints_equal(&a, &b));

        let c = vec![ep("10.0.0.6", 8080, 1), ep("10.0.0.5", 9090, 1)];
        assert!(!endpoints_equal(&a, &c));
        assert!(!endpoints_equal(&a, &a[..1]));
    }

    #[test]
    fn test_rules_to_create() {
        let desired = vec![
            model("ns_app", vec![ep("10.0.0.5", 8080, 1)]),
            model("ns_app_https", vec![ep("10.0.0.5", 8080, 1)]),
        ];
        let snapshot = vec![
            model("ns_app", vec![ep("10.0.0.5", 8080, 1)]),
            model("ns_app_https", vec![ep("10.0.0.7", 8080, 1)]),
            model("other_app", vec![ep("10.0.0.5", 8080, 1)]),
        ];

        let create = rules_to_create(&desired, &snapshot);
        assert_eq!(create.len(), 1);
        assert_eq!(create[0].name(), "ns_app_https");
        assert!(rules_to_create(&desired, &[]).len() == 2);
    }

    #[test]
    fn test_stale_names() {
        let owned = ["ns_app".to_string(), "ns_app_https".to_string()];
        let desired = vec![model("ns_app_https", vec![ep("10.0.0.5", 8080, 1)])];
        let snapshot = vec![model("ns_app", vec![ep("10.0.0.5", 8080, 1)])];

        assert_eq!(stale_names(&owned, &desired, &snapshot), vec!["ns_app".to_string()]);
        assert!(stale_names(&owned, &desired, &[]).is_empty());
        assert!(any_installed(&owned, &snapshot));
        assert!(!any_installed(&owned[1..], &snapshot));
    }
}

//! Query catalog
//!
//! Cost-management groups are evaluated as range queries over an hour.
//! Resource-optimization groups are evaluated as instant queries at the end
//! of each 15 minute window and only cover namespaces that opted in.

use super::query::{AggregationSpec, Method, Query};

const OPT_IN_INSIGHTS: &str = "kube_namespace_labels{label_insights_cost_management_optimizations='true', namespace!~'kube-.*|openshift|openshift-.*'}";
const OPT_IN: &str = "kube_namespace_labels{label_cost_management_optimizations='true', namespace!~'kube-.*|openshift|openshift-.*'}";

const NODE_INFO_JOIN: &str = "* on(node) group_left(provider_id) max by (node, provider_id) (kube_node_info)";
const PVC_INFO_JOIN: &str = "* on(persistentvolumeclaim, namespace) group_left(volumename) max by(namespace, persistentvolumeclaim, volumename) (kube_persistentvolumeclaim_info{volumename != ''})";
const POD_RUNNING_JOIN: &str = "* on(pod, namespace) group_left max by (pod, namespace) (kube_pod_status_phase{phase='Running'})";
const VMI_RUNNING_JOIN: &str = "* on (name, namespace) group_left max by (name, namespace) (kubevirt_vmi_info{phase='running'})";
const CONTAINER_RUNNING_JOIN: &str = "* on(pod, namespace) group_left max by (container, pod, namespace) (kube_pod_status_phase{phase='Running'})";

const CONTAINER_FILTER: &str = "container!='', container!='POD', pod!=''";

const NODE_KEY: &[&str] = &["node"];
const POD_KEY: &[&str] = &["pod", "namespace"];
const VM_KEY: &[&str] = &["name", "namespace"];
const CONTAINER_KEY: &[&str] = &["container", "pod", "namespace"];
const NAMESPACE_KEY: &[&str] = &["namespace"];
const GPU_POD_KEY: &[&str] = &["pod", "namespace", "node"];
const GPU_KEY: &[&str] = &["exported_pod", "exported_namespace", "Hostname", "UUID"];

/// Namespaces opted in to resource optimization
pub fn ros_namespace_filter() -> Query {
    Query::new(
        "ros-namespace-filter",
        format!("{OPT_IN_INSIGHTS} or {OPT_IN}"),
    )
    .static_labels(&["namespace"])
    .row_key(NAMESPACE_KEY)
}

/// Node capacity, allocatable, role and labels
pub fn node_queries() -> Vec<Query> {
    let capacity = |name: &str, status: &str, resource: &str, total: &str| {
        Query::new(
            name,
            format!("kube_node_status_{status}{{resource='{resource}'}} {NODE_INFO_JOIN}"),
        )
        .static_labels(&["node", "provider_id"])
        .aggregate(AggregationSpec::new(name, Method::Max).transformed(total))
        .row_key(NODE_KEY)
    };

    vec![
        capacity(
            "node-allocatable-cpu-cores",
            "allocatable",
            "cpu",
            "node-allocatable-cpu-core-seconds",
        ),
        capacity(
            "node-allocatable-memory-bytes",
            "allocatable",
            "memory",
            "node-allocatable-memory-byte-seconds",
        ),
        capacity(
            "node-capacity-cpu-cores",
            "capacity",
            "cpu",
            "node-capacity-cpu-core-seconds",
        ),
        capacity(
            "node-capacity-memory-bytes",
            "capacity",
            "memory",
            "node-capacity-memory-byte-seconds",
        ),
        Query::new("node-role", "kube_node_role")
            .static_field("node", "node")
            .static_field("node-role", "role")
            .row_key(NODE_KEY),
        Query::new("node-labels", "kube_node_labels")
            .label_field("node_labels", "label_*")
            .row_key(NODE_KEY),
    ]
}

/// Pod requests, limits, usage and labels
pub fn pod_queries() -> Vec<Query> {
    let pod_filter = "pod!='', namespace!='', node!=''";
    let quantity = |name: &str, total: &str, expr: String| {
        Query::new(name, format!("sum by (pod, namespace, node) ({expr})"))
            .static_labels(&["pod", "namespace", "node"])
            .aggregate(AggregationSpec::new(name, Method::Sum).transformed(total))
            .row_key(POD_KEY)
    };
    let resource = |kind: &str, resource: &str| {
        format!("kube_pod_container_resource_{kind}{{{pod_filter}, resource='{resource}'}} {POD_RUNNING_JOIN}")
    };
    let usage_filter = format!("container!='', container!='POD', {pod_filter}");

    vec![
        quantity(
            "pod-limit-cpu-cores",
            "pod-limit-cpu-core-seconds",
            resource("limits", "cpu"),
        ),
        quantity(
            "pod-limit-memory-bytes",
            "pod-limit-memory-byte-seconds",
            resource("limits", "memory"),
        ),
        quantity(
            "pod-request-cpu-cores",
            "pod-request-cpu-core-seconds",
            resource("requests", "cpu"),
        ),
        quantity(
            "pod-request-memory-bytes",
            "pod-request-memory-byte-seconds",
            resource("requests", "memory"),
        ),
        quantity(
            "pod-usage-cpu-cores",
            "pod-usage-cpu-core-seconds",
            format!("rate(container_cpu_usage_seconds_total{{{usage_filter}}}[5m])"),
        ),
        quantity(
            "pod-usage-memory-bytes",
            "pod-usage-memory-byte-seconds",
            format!("container_memory_usage_bytes{{{usage_filter}}}"),
        ),
        Query::new(
            "pod-labels",
            format!("kube_pod_labels{{namespace!='',pod!=''}} {POD_RUNNING_JOIN}"),
        )
        .static_labels(&["pod", "namespace"])
        .label_field("pod_labels", "label_*")
        .row_key(POD_KEY),
    ]
}

/// Persistent volume claims, their capacity, requests, usage and labels
pub fn storage_queries() -> Vec<Query> {
    vec![
        Query::new(
            "persistentvolume-pod-info",
            format!("kube_pod_spec_volumes_persistentvolumeclaims_info {PVC_INFO_JOIN}"),
        )
        .static_labels(&["namespace", "pod"])
        .row_key(&["volumename"]),
        Query::new(
            "persistentvolumeclaim-capacity-bytes",
            "kube_persistentvolume_capacity_bytes{persistentvolume != ''}",
        )
        .aggregate(
            AggregationSpec::new("persistentvolumeclaim-capacity-bytes", Method::Max)
                .transformed("persistentvolumeclaim-capacity-byte-seconds"),
        )
        .row_key(&["persistentvolume"]),
        Query::new(
            "persistentvolumeclaim-request-bytes",
            format!("kube_persistentvolumeclaim_resource_requests_storage_bytes {PVC_INFO_JOIN}"),
        )
        .aggregate(
            AggregationSpec::new("persistentvolumeclaim-request-bytes", Method::Max)
                .transformed("persistentvolumeclaim-request-byte-seconds"),
        )
        .row_key(&["volumename"]),
        Query::new(
            "persistentvolumeclaim-usage-bytes",
            format!("kubelet_volume_stats_used_bytes {PVC_INFO_JOIN}"),
        )
        .static_labels(&["node"])
        .aggregate(
            AggregationSpec::new("persistentvolumeclaim-usage-bytes", Method::Sum)
                .transformed("persistentvolumeclaim-usage-byte-seconds"),
        )
        .row_key(&["volumename"]),
        Query::new(
            "persistentvolume-labels",
            "kube_persistentvolume_labels * on(persistentvolume, namespace) group_left(storageclass, csi_driver, csi_volume_handle) max by(namespace, persistentvolume, storageclass, csi_driver, csi_volume_handle) (kube_persistentvolume_info)",
        )
        .static_labels(&["storageclass", "persistentvolume", "csi_driver", "csi_volume_handle"])
        .label_field("persistentvolume_labels", "label_*")
        .row_key(&["persistentvolume"]),
        Query::new(
            "persistentvolumeclaim-labels",
            format!("kube_persistentvolumeclaim_labels {PVC_INFO_JOIN}"),
        )
        .static_labels(&["namespace", "persistentvolumeclaim"])
        .label_field("persistentvolumeclaim_labels", "label_")
        .row_key(&["volumename"]),
    ]
}

/// KubeVirt virtual machine resources
pub fn vm_queries() -> Vec<Query> {
    let sized = |name: &str, method: Method, total: &str, expr: String| {
        Query::new(name, format!("{expr} {VMI_RUNNING_JOIN}"))
            .static_labels(&["name", "namespace"])
            .aggregate(AggregationSpec::new(name, method).transformed(total))
            .row_key(VM_KEY)
    };
    let requests = |extra: &str| {
        format!("sum by (name, namespace) (kubevirt_vm_resource_requests{{name!='', namespace!='', {extra}}})")
    };
    let limits = |extra: &str| {
        format!("sum by (name, namespace) (kubevirt_vm_resource_limits{{name!='', namespace!='', {extra}}})")
    };

    vec![
        sized(
            "vm_cpu_limit_cores",
            Method::Max,
            "vm_cpu_limit_core_seconds",
            limits("resource='cpu'"),
        ),
        sized(
            "vm_cpu_request_cores",
            Method::Max,
            "vm_cpu_request_core_seconds",
            requests("resource='cpu', unit='cores'"),
        ),
        sized(
            "vm_cpu_request_sockets",
            Method::Max,
            "vm_cpu_request_socket_seconds",
            requests("resource='cpu', unit='sockets'"),
        ),
        sized(
            "vm_cpu_request_threads",
            Method::Max,
            "vm_cpu_request_thread_seconds",
            requests("resource='cpu', unit='threads'"),
        ),
        sized(
            "vm_cpu_usage",
            Method::Sum,
            "vm_cpu_usage_total_seconds",
            "sum by (name, namespace) (rate(kubevirt_vmi_cpu_usage_seconds_total{name!='', namespace!=''}[5m]))".to_string(),
        ),
        sized(
            "vm_memory_limit_bytes",
            Method::Max,
            "vm_memory_limit_byte_seconds",
            limits("resource='memory'"),
        ),
        sized(
            "vm_memory_request_bytes",
            Method::Max,
            "vm_memory_request_byte_seconds",
            requests("resource='memory'"),
        )
        .static_labels(&["resource"]),
        sized(
            "vm_memory_usage_bytes",
            Method::Sum,
            "vm_memory_usage_byte_seconds",
            "sum by (name, namespace) (sum_over_time(kubevirt_vmi_memory_used_bytes{name!='', namespace!=''}[5m]))".to_string(),
        ),
        Query::new(
            "vm_info",
            format!("sum by (name, namespace, node, os, instance_type, guest_os_name, guest_os_version_id, guest_os_arch) (kubevirt_vmi_info{{phase='running'}}) {NODE_INFO_JOIN}"),
        )
        .static_labels(&[
            "node",
            "provider_id",
            "name",
            "namespace",
            "instance_type",
            "os",
            "guest_os_arch",
            "guest_os_name",
            "guest_os_version_id",
        ])
        .aggregate(AggregationSpec::total_only(Method::Sum, "vm_uptime_total_seconds"))
        .row_key(VM_KEY),
        sized(
            "vm_disk_allocated_size_bytes",
            Method::Max,
            "vm_disk_allocated_size_byte_seconds",
            "sum by (name, namespace, device, persistentvolumeclaim, volume_mode) (kubevirt_vm_disk_allocated_size_bytes{name!='', namespace!=''})".to_string(),
        )
        .static_labels(&["device", "volume_mode"])
        .static_field("persistentvolumeclaim_name", "persistentvolumeclaim"),
        Query::new("vm_labels", "kubevirt_vm_labels{name!='', namespace!=''}")
            .static_labels(&["name", "namespace"])
            .label_field("vm_labels", "label_*")
            .row_key(VM_KEY),
    ]
}

/// Namespace labels
pub fn namespace_queries() -> Vec<Query> {
    vec![Query::new("namespace-labels", "kube_namespace_labels")
        .static_labels(&["namespace"])
        .label_field("namespace_labels", "label_*")
        .row_key(NAMESPACE_KEY)]
}

/// NVIDIA GPU memory capacity per pod and the time each pod held a GPU.
///
/// Capacity rows are keyed by pod, namespace and node; utilization rows also
/// carry the GPU UUID. Utilization labels come from the DCGM exporter, which
/// reports the workload as `exported_pod`/`exported_namespace` on `Hostname`.
pub fn nvidia_gpu_queries() -> Vec<Query> {
    let capacity = format!(
        "sum by (pod, namespace, node, resource, label_nvidia_com_gpu_memory) \
         ((kube_pod_container_resource_requests{{pod!='', namespace!='', node!='', resource='nvidia_com_gpu'}} {POD_RUNNING_JOIN}) \
         * on(node) group_left(label_nvidia_com_gpu_memory) (max by (node, label_nvidia_com_gpu_memory) (kube_node_labels)))"
    );
    let utilization = "sum by (exported_pod, exported_namespace, Hostname, UUID, modelName) (DCGM_FI_PROF_GR_ENGINE_ACTIVE) \
         * on(exported_pod, exported_namespace) group_left(pod, namespace) \
         max by (exported_pod, exported_namespace, pod, namespace) \
         (label_replace(label_replace(kube_pod_status_phase{phase='Running'}, 'exported_pod', '$1', 'pod', '(.*)'), 'exported_namespace', '$1', 'namespace', '(.*)'))";

    vec![
        Query::new("nvidia-gpu-memory-capacity-mib", capacity)
            .static_labels(&["pod", "namespace", "node"])
            .static_field("vendor_name", "resource")
            .static_field("gpu_memory_capacity_mib", "label_nvidia_com_gpu_memory")
            .row_key(GPU_POD_KEY),
        Query::new("nvidia-gpu-utilization", utilization)
            .static_field("node", "Hostname")
            .static_field("namespace", "exported_namespace")
            .static_field("pod", "exported_pod")
            .static_field("gpu_uuid", "UUID")
            .static_field("model_name", "modelName")
            .aggregate(AggregationSpec::total_only(
                Method::Sum,
                "nvidia-gpu-pod-uptime-seconds",
            ))
            .row_key(GPU_KEY),
    ]
}

/// `agg by(container, pod, namespace, node) (expr)` joined against either opt-in label
fn opted_in_containers(agg: &str, expr: &str) -> String {
    let branch = |selector: &str| {
        format!("({agg} by(container, pod, namespace, node) ({expr} * on(namespace) group_left {selector}))")
    };
    format!("{} or {}", branch(OPT_IN_INSIGHTS), branch(OPT_IN))
}

/// Same as `opted_in_containers`, restricted to running pods
fn running_opted_in_containers(agg: &str, expr: &str) -> String {
    format!("({}) {CONTAINER_RUNNING_JOIN}", opted_in_containers(agg, expr))
}

/// `expr` joined against either opt-in label, grouped by namespace
fn opted_in_namespaces(expr: &str) -> String {
    format!("({expr} * on(namespace) group_left {OPT_IN_INSIGHTS} or {expr} * on(namespace) group_left {OPT_IN})")
}

/// Container-level resource optimization metrics
pub fn ros_container_queries() -> Vec<Query> {
    let value = |name: &str, query_string: String| {
        Query::new(name, query_string)
            .static_field("container_name", "container")
            .static_labels(&["pod", "namespace", "node"])
            .aggregate(AggregationSpec::value(name))
            .row_key(CONTAINER_KEY)
    };
    let quantity = |kind: &str, resource: &str, unit: &str| {
        format!("kube_pod_container_resource_{kind}{{{CONTAINER_FILTER}, resource='{resource}', unit='{unit}'}}")
    };
    let over_time = |func: &str, metric: &str| {
        format!("{func}_over_time({metric}{{{CONTAINER_FILTER}}}[15m])")
    };
    let cpu_usage = "node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate";
    let throttle = format!("rate(container_cpu_cfs_throttled_seconds_total{{{CONTAINER_FILTER}}}[15m])");

    let owners = |name: &str, joined: &str, source: &str, labels: &[&str]| {
        let info = "max_over_time(kube_pod_container_info{container!='', container!='POD'}[15m])";
        Query::new(
            name,
            format!(
                "(({info} * on(namespace) group_left {OPT_IN_INSIGHTS}) or ({info} * on(namespace) group_left {OPT_IN})) * on(pod, namespace) group_left({joined}) max by(pod, namespace, {joined}) (max_over_time({source}[15m]))"
            ),
        )
        .static_field("image_name", "image")
        .static_labels(labels)
        .static_field("container_name", "container")
        .static_labels(&["pod", "namespace"])
        .row_key(CONTAINER_KEY)
    };

    let mut queries = vec![
        owners(
            "container-image-owner",
            "owner_kind, owner_name",
            "kube_pod_owner{container!='', container!='POD', pod!=''}",
            &["owner_name", "owner_kind"],
        ),
        owners(
            "container-image-workload",
            "workload, workload_type",
            "namespace_workload_pod:kube_pod_owner:relabel{pod!=''}",
            &["workload", "workload_type"],
        ),
    ];

    for (kind, label) in [("requests", "request"), ("limits", "limit")] {
        for (resource, unit, metric) in [("cpu", "core", "cpu"), ("memory", "byte", "memory")] {
            for agg in ["avg", "sum"] {
                queries.push(value(
                    &format!("{metric}-{label}-container-{agg}"),
                    running_opted_in_containers(agg, &quantity(kind, resource, unit)),
                ));
            }
        }
    }

    for (agg, over) in [("avg", "avg"), ("min", "min"), ("max", "max"), ("sum", "avg")] {
        queries.push(value(
            &format!("cpu-usage-container-{agg}"),
            opted_in_containers(agg, &over_time(over, cpu_usage)),
        ));
    }
    for agg in ["avg", "max", "min", "sum"] {
        queries.push(value(
            &format!("cpu-throttle-container-{agg}"),
            opted_in_containers(agg, &throttle),
        ));
    }
    for (prefix, metric) in [
        ("memory-usage", "container_memory_working_set_bytes"),
        ("memory-rss-usage", "container_memory_rss"),
    ] {
        for (agg, over) in [("avg", "avg"), ("min", "min"), ("max", "max"), ("sum", "avg")] {
            queries.push(value(
                &format!("{prefix}-container-{agg}"),
                opted_in_containers(agg, &over_time(over, metric)),
            ));
        }
    }

    queries
}

/// Namespace-level resource optimization metrics
pub fn ros_namespace_queries() -> Vec<Query> {
    let value = |name: &str, expr: String| {
        Query::new(name, opted_in_namespaces(&expr))
            .static_labels(&["namespace"])
            .aggregate(AggregationSpec::value(name))
            .row_key(NAMESPACE_KEY)
    };
    let quota = |resource: &str| {
        format!("sum by (namespace) (kube_resourcequota{{resource='{resource}', type='hard'}})")
    };
    let subquery = |func: &str, inner: &str| format!("{func}_over_time(sum by(namespace) ({inner})[15m:])");

    let cpu_usage = format!("node_namespace_pod_container:container_cpu_usage_seconds_total:sum_irate{{{CONTAINER_FILTER}}}");
    let throttle = format!("rate(container_cpu_cfs_throttled_seconds_total{{{CONTAINER_FILTER}}}[5m])");
    let memory = format!("container_memory_working_set_bytes{{{CONTAINER_FILTER}}}");
    let rss = format!("container_memory_rss{{{CONTAINER_FILTER}}}");

    let mut queries = vec![
        value("cpu-request-namespace-sum", quota("requests.cpu")),
        value("cpu-limit-namespace-sum", quota("limits.cpu")),
    ];
    for func in ["avg", "max", "min"] {
        queries.push(value(&format!("cpu-usage-namespace-{func}"), subquery(func, &cpu_usage)));
    }
    for func in ["avg", "max", "min"] {
        queries.push(value(&format!("cpu-throttle-namespace-{func}"), subquery(func, &throttle)));
    }
    queries.push(value("memory-request-namespace-sum", quota("requests.memory")));
    queries.push(value("memory-limit-namespace-sum", quota("limits.memory")));
    for func in ["avg", "max", "min"] {
        queries.push(value(&format!("memory-usage-namespace-{func}"), subquery(func, &memory)));
    }
    for func in ["avg", "max", "min"] {
        queries.push(value(&format!("memory-rss-usage-namespace-{func}"), subquery(func, &rss)));
    }
    for func in ["max", "avg"] {
        queries.push(value(
            &format!("pods-running-namespace-{func}"),
            subquery(func, "kube_pod_status_phase{phase='Running'}"),
        ));
    }
    for func in ["max", "avg"] {
        queries.push(value(
            &format!("pods-total-namespace-{func}"),
            subquery(func, "kube_pod_info"),
        ));
    }

    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_groups() -> Vec<Vec<Query>> {
        vec![
            node_queries(),
            pod_queries(),
            storage_queries(),
            vm_queries(),
            namespace_queries(),
            nvidia_gpu_queries(),
            ros_container_queries(),
            ros_namespace_queries(),
        ]
    }

    #[test]
    fn test_query_names_unique_within_group() {
        for group in all_groups() {
            let names: HashSet<_> = group.iter().map(|q| q.name.as_str()).collect();
            assert_eq!(names.len(), group.len());
        }
    }

    #[test]
    fn test_every_query_has_a_row_key() {
        for group in all_groups() {
            for query in group {
                assert!(!query.row_key.is_empty(), "{} has no row key", query.name);
            }
        }
    }

    #[test]
    fn test_gpu_utilization_saves_only_uptime_total() {
        let queries = nvidia_gpu_queries();
        let utilization = queries
            .iter()
            .find(|q| q.name == "nvidia-gpu-utilization")
            .unwrap();
        let spec = utilization.aggregation.as_ref().unwrap();
        assert_eq!(spec.value_name, None);
        assert_eq!(spec.method, Method::Sum);
        assert_eq!(
            spec.transformed_name.as_deref(),
            Some("nvidia-gpu-pod-uptime-seconds")
        );
        assert!(utilization.row_key.contains(&"UUID".to_string()));
        assert!(queries[0].query_string.contains("resource='nvidia_com_gpu'"));
    }

    #[test]
    fn test_ros_queries_filter_opted_in_namespaces() {
        for query in ros_container_queries().iter().chain(ros_namespace_queries().iter()) {
            assert!(query.query_string.contains(OPT_IN_INSIGHTS), "{}", query.name);
            assert!(query.query_string.contains(OPT_IN), "{}", query.name);
        }
    }

    #[test]
    fn test_ros_container_catalog_covers_row_fields() {
        let names: HashSet<_> = ros_container_queries()
            .into_iter()
            .filter_map(|q| q.aggregation.and_then(|a| a.value_name))
            .collect();
        for field in [
            "cpu-request-container-avg",
            "cpu-limit-container-sum",
            "cpu-usage-container-min",
            "cpu-throttle-container-max",
            "memory-request-container-sum",
            "memory-usage-container-max",
            "memory-rss-usage-container-sum",
        ] {
            assert!(names.contains(field), "missing {field}");
        }
    }

    #[test]
    fn test_node_capacity_uses_max_with_total() {
        let queries = node_queries();
        let capacity = queries
            .iter()
            .find(|q| q.name == "node-capacity-cpu-cores")
            .unwrap();
        let spec = capacity.aggregation.as_ref().unwrap();
        assert_eq!(spec.method, Method::Max);
        assert_eq!(
            spec.transformed_name.as_deref(),
            Some("node-capacity-cpu-core-seconds")
        );
        assert_eq!(
            capacity.query_string,
            "kube_node_status_capacity{resource='cpu'} * on(node) group_left(provider_id) max by (node, provider_id) (kube_node_info)"
        );
    }
}

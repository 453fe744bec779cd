//! Collection tests against a scripted metrics source
//!
//! The scripted source answers each query from a closure, so retry
//! behaviour and the full report pipeline run without a Prometheus server.

#[cfg(test)]
mod engine_tests {
    use crate::collector::{
        MappedResults, MetricsSource, Query, QueryEngine, RetryPolicy, AggregationSpec, Method,
    };
    use crate::error::{CollectorError, SourceError};
    use crate::models::{
        InstantSample, QueryResult, QueryValue, RangeSeries, SamplePair, TimeRange,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Responder = dyn Fn(&str, usize) -> Result<QueryResult, SourceError> + Send + Sync;

    /// Answers queries from a closure given the query text and how many
    /// times that text has been asked before
    struct ScriptedSource {
        calls: Mutex<HashMap<String, usize>>,
        respond: Box<Responder>,
    }

    impl ScriptedSource {
        fn new(
            respond: impl Fn(&str, usize) -> Result<QueryResult, SourceError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(HashMap::new()),
                respond: Box::new(respond),
            })
        }

        fn calls(&self, query: &str) -> usize {
            self.calls.lock().unwrap().get(query).copied().unwrap_or(0)
        }

        fn answer(&self, query: &str) -> Result<QueryResult, SourceError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(query.to_string()).or_insert(0);
                *count += 1;
                *count - 1
            };
            (self.respond)(query, attempt)
        }
    }

    #[async_trait]
    impl MetricsSource for ScriptedSource {
        async fn query_range(&self, query: &str, _range: &TimeRange) -> Result<QueryResult, SourceError> {
            self.answer(query)
        }

        async fn query(&self, query: &str, _time: DateTime<Utc>) -> Result<QueryResult, SourceError> {
            self.answer(query)
        }
    }

    fn engine(source: Arc<ScriptedSource>, max_retries: u32) -> QueryEngine {
        QueryEngine::new(source).with_retry_policy(RetryPolicy {
            max_retries,
            backoff_unit: Duration::ZERO,
        })
    }

    fn hour() -> TimeRange {
        TimeRange::hour(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
    }

    fn series(labels: &[(&str, &str)], values: &[f64]) -> RangeSeries {
        RangeSeries {
            metric: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            values: values
                .iter()
                .enumerate()
                .map(|(i, v)| SamplePair::new(1_705_312_800.0 + 60.0 * i as f64, *v))
                .collect(),
        }
    }

    fn matrix(series: Vec<RangeSeries>) -> Result<QueryResult, SourceError> {
        Ok(QueryResult::new(QueryValue::Matrix(series)))
    }

    fn cpu_query() -> Query {
        Query::new("cpu", "node_cpu")
            .static_labels(&["node"])
            .aggregate(AggregationSpec::new("cpu", Method::Max))
            .row_key(&["node"])
    }

    #[tokio::test]
    async fn test_failed_query_succeeds_on_retry() {
        let source = ScriptedSource::new(|_, attempt| {
            if attempt == 0 {
                Err(SourceError::Unavailable("connection refused".into()))
            } else {
                matrix(vec![series(&[("node", "n1")], &[2.0, 3.0])])
            }
        });
        let engine = engine(source.clone(), 3);
        let mut results = MappedResults::new();

        engine
            .query_range(&[cpu_query()], &hour(), &mut results)
            .await
            .unwrap();

        assert_eq!(source.calls("node_cpu"), 2);
        assert_eq!(results.get("n1").unwrap()["cpu"], "3.000000");
    }

    #[tokio::test]
    async fn test_only_failed_queries_are_retried() {
        let source = ScriptedSource::new(|query, attempt| {
            if query == "flaky" && attempt == 0 {
                Err(SourceError::Unavailable("try again".into()))
            } else {
                matrix(vec![series(&[("node", "n1")], &[1.0])])
            }
        });
        let engine = engine(source.clone(), 2);
        let queries = vec![
            cpu_query(),
            Query::new("flaky", "flaky")
                .static_labels(&["node"])
                .aggregate(AggregationSpec::new("flaky", Method::Sum))
                .row_key(&["node"]),
        ];
        let mut results = MappedResults::new();

        engine.query_range(&queries, &hour(), &mut results).await.unwrap();

        assert_eq!(source.calls("node_cpu"), 1);
        assert_eq!(source.calls("flaky"), 2);
        let row = results.get("n1").unwrap();
        assert!(row.contains_key("cpu"));
        assert!(row.contains_key("flaky"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_name_the_query() {
        let source = ScriptedSource::new(|_, _| Err(SourceError::Unavailable("down".into())));
        let engine = engine(source.clone(), 1);
        let mut results = MappedResults::new();

        let err = engine
            .query_range(&[cpu_query()], &hour(), &mut results)
            .await
            .unwrap_err();

        assert_eq!(source.calls("node_cpu"), 2);
        match err {
            CollectorError::Query { query, .. } => assert_eq!(query, "node_cpu"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_not_retried() {
        let source = ScriptedSource::new(|_, _| Ok(QueryResult::new(QueryValue::Vector(vec![]))));
        let engine = engine(source.clone(), 5);
        let mut results = MappedResults::new();

        let err = engine
            .query_range(&[cpu_query()], &hour(), &mut results)
            .await
            .unwrap_err();

        assert_eq!(source.calls("node_cpu"), 1);
        assert!(matches!(
            err,
            CollectorError::UnexpectedResult { expected: "matrix", .. }
        ));
    }

    #[tokio::test]
    async fn test_instant_queries_merge_vectors() {
        let source = ScriptedSource::new(|_, _| {
            Ok(QueryResult::new(QueryValue::Vector(vec![InstantSample {
                metric: [("node".to_string(), "n2".to_string())].into_iter().collect(),
                value: SamplePair::new(1_705_312_800.0, 0.5),
            }])))
        });
        let engine = engine(source, 0);
        let mut results = MappedResults::new();

        engine
            .query_instant(&[cpu_query()], hour().end, &mut results)
            .await
            .unwrap();

        assert_eq!(results.get("n2").unwrap()["cpu"], "0.500000");
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        struct Stalled;

        #[async_trait]
        impl MetricsSource for Stalled {
            async fn query_range(&self, _: &str, _: &TimeRange) -> Result<QueryResult, SourceError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                matrix(vec![])
            }

            async fn query(&self, _: &str, _: DateTime<Utc>) -> Result<QueryResult, SourceError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                matrix(vec![])
            }
        }

        let engine = QueryEngine::new(Arc::new(Stalled))
            .with_timeout(Duration::from_millis(10))
            .with_retry_policy(RetryPolicy {
                max_retries: 0,
                backoff_unit: Duration::ZERO,
            });
        let mut results = MappedResults::new();

        let err = engine
            .query_range(&[cpu_query()], &hour(), &mut results)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CollectorError::Query {
                source: SourceError::Timeout(_),
                ..
            }
        ));
    }
}

#[cfg(test)]
mod generate_tests {
    use crate::collector::{
        generate_reports, MetricsSource, QueryEngine, ReportConfig, ReportKind, RetryPolicy,
    };
    use crate::dirconfig::DirectoryConfig;
    use crate::error::{CollectorError, SourceError};
    use crate::models::{
        InstantSample, QueryResult, QueryValue, RangeSeries, SamplePair, TimeRange,
    };
    use crate::status::OperatorStatus;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// A one-node cluster; `ros_namespaces` lists the opted-in namespaces
    struct FakeCluster {
        ros_namespaces: Vec<&'static str>,
        nodes: bool,
    }

    fn labels(pairs: &[(&str, &str)]) -> crate::models::LabelSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[async_trait]
    impl MetricsSource for FakeCluster {
        async fn query_range(&self, query: &str, range: &TimeRange) -> Result<QueryResult, SourceError> {
            let start = range.start.timestamp() as f64;
            let samples = |v: f64| vec![SamplePair::new(start, v), SamplePair::new(start + 60.0, v)];
            let mut matrix = Vec::new();

            if self.nodes && query.starts_with("kube_node_status_capacity{resource='cpu'}") {
                matrix.push(RangeSeries {
                    metric: labels(&[("node", "worker-1"), ("provider_id", "aws:///us-east-1a/i-0abc")]),
                    values: samples(4.0),
                });
            } else if self.nodes && query == "kube_node_role" {
                matrix.push(RangeSeries {
                    metric: labels(&[("node", "worker-1"), ("role", "worker")]),
                    values: samples(1.0),
                });
            } else if query.contains("kube_pod_container_resource_requests{pod!='', namespace!='', node!='', resource='cpu'}") {
                matrix.push(RangeSeries {
                    metric: labels(&[("pod", "web-1"), ("namespace", "shop"), ("node", "worker-1")]),
                    values: samples(0.25),
                });
            } else if self.nodes && query.contains("resource='nvidia_com_gpu'") {
                matrix.push(RangeSeries {
                    metric: labels(&[
                        ("pod", "train-0"),
                        ("namespace", "ml"),
                        ("node", "worker-1"),
                        ("resource", "nvidia_com_gpu"),
                        ("label_nvidia_com_gpu_memory", "40960"),
                    ]),
                    values: samples(1.0),
                });
            } else if self.nodes && query.contains("DCGM_FI_PROF_GR_ENGINE_ACTIVE") {
                matrix.push(RangeSeries {
                    metric: labels(&[
                        ("exported_pod", "train-0"),
                        ("exported_namespace", "ml"),
                        ("Hostname", "worker-1"),
                        ("UUID", "GPU-5f1c"),
                        ("modelName", "NVIDIA A100-PCIE-40GB"),
                    ]),
                    values: samples(0.5),
                });
            }
            Ok(QueryResult::new(QueryValue::Matrix(matrix)))
        }

        async fn query(&self, query: &str, time: DateTime<Utc>) -> Result<QueryResult, SourceError> {
            let vector = if query.starts_with("kube_namespace_labels{label_insights_cost_management_optimizations") {
                self.ros_namespaces
                    .iter()
                    .map(|ns| InstantSample {
                        metric: labels(&[("namespace", ns)]),
                        value: SamplePair::new(time.timestamp() as f64, 1.0),
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Ok(QueryResult::new(QueryValue::Vector(vector)))
        }
    }

    fn engine(cluster: FakeCluster) -> QueryEngine {
        QueryEngine::new(Arc::new(cluster)).with_retry_policy(RetryPolicy {
            max_retries: 0,
            backoff_unit: Duration::ZERO,
        })
    }

    fn hour() -> TimeRange {
        TimeRange::hour(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap())
    }

    fn read(dirs: &DirectoryConfig, kind: ReportKind) -> String {
        fs::read_to_string(dirs.reports.join(kind.file_name("202401"))).unwrap()
    }

    #[tokio::test]
    async fn test_no_nodes_is_no_data() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let engine = engine(FakeCluster {
            ros_namespaces: vec![],
            nodes: false,
        });

        let err = generate_reports(&ReportConfig::default(), &dirs, &engine, &hour(), &mut status)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::NoData));
        assert!(dirs.reports.files().unwrap().is_empty());
        assert_eq!(status.reports.report_month, "01");
    }

    #[tokio::test]
    async fn test_cost_reports_are_written() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let engine = engine(FakeCluster {
            ros_namespaces: vec![],
            nodes: true,
        });
        let config = ReportConfig {
            disable_resource_optimization: true,
            ..Default::default()
        };

        let summary = generate_reports(&config, &dirs, &engine, &hour(), &mut status)
            .await
            .unwrap();

        assert_eq!(summary.files.len(), 6);
        assert_eq!(
            dirs.reports.files().unwrap(),
            vec![
                "cm-openshift-namespace-usage-202401.csv",
                "cm-openshift-node-usage-202401.csv",
                "cm-openshift-nvidia-gpu-usage-202401.csv",
                "cm-openshift-pod-usage-202401.csv",
                "cm-openshift-storage-usage-202401.csv",
                "cm-openshift-vm-usage-202401.csv",
            ]
        );

        let node = read(&dirs, ReportKind::Node);
        assert!(node.lines().nth(1).unwrap().contains(",worker-1,"));

        let pod = read(&dirs, ReportKind::Pod);
        let row = pod.lines().nth(1).unwrap();
        assert!(row.contains(",worker-1,shop,web-1,"));
        assert!(row.contains(",30.000000,"));
        assert!(row.contains(",4.000000,480.000000,"));
        assert!(row.contains(",worker,i-0abc,"));
        assert_eq!(summary.rows, 3);
    }

    #[tokio::test]
    async fn test_nvidia_gpu_report_is_written() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let engine = engine(FakeCluster {
            ros_namespaces: vec![],
            nodes: true,
        });
        let config = ReportConfig {
            disable_resource_optimization: true,
            ..Default::default()
        };

        generate_reports(&config, &dirs, &engine, &hour(), &mut status)
            .await
            .unwrap();

        let report = read(&dirs, ReportKind::NvidiaGpu);
        let mut lines = report.lines();
        assert_eq!(
            lines.next().unwrap(),
            "report_period_start,report_period_end,interval_start,interval_end,\
             node,namespace,pod,gpu_uuid,gpu_model_name,gpu_vendor_name,gpu_memory_capacity_mib,gpu_pod_uptime"
        );
        let row = lines.next().unwrap();
        // two samples of 0.5 summed, then scaled to seconds
        assert!(row.ends_with(
            ",worker-1,ml,train-0,GPU-5f1c,NVIDIA A100-PCIE-40GB,nvidia_com_gpu,40960,60.000000"
        ));
        assert!(lines.next().is_none());
    }

    #[tokio::test]
    async fn test_repeating_an_hour_does_not_duplicate_rows() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let config = ReportConfig {
            disable_resource_optimization: true,
            ..Default::default()
        };

        for _ in 0..2 {
            let engine = engine(FakeCluster {
                ros_namespaces: vec![],
                nodes: true,
            });
            generate_reports(&config, &dirs, &engine, &hour(), &mut status)
                .await
                .unwrap();
        }

        assert_eq!(read(&dirs, ReportKind::Node).lines().count(), 2);
        assert_eq!(read(&dirs, ReportKind::Pod).lines().count(), 2);
    }

    #[tokio::test]
    async fn test_no_opted_in_namespaces() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let engine = engine(FakeCluster {
            ros_namespaces: vec![],
            nodes: true,
        });

        let err = generate_reports(&ReportConfig::default(), &dirs, &engine, &hour(), &mut status)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::NoEnabledNamespaces));
        assert!(err.is_sentinel());
        let files = dirs.reports.files().unwrap();
        assert!(files.iter().all(|f| !f.starts_with("ros-openshift")));
        assert!(files.contains(&"cm-openshift-node-usage-202401.csv".to_string()));
    }

    #[tokio::test]
    async fn test_resource_optimization_reports_per_window() {
        let tmp = TempDir::new().unwrap();
        let dirs = DirectoryConfig::create(tmp.path()).unwrap();
        let mut status = OperatorStatus::default();
        let engine = engine(FakeCluster {
            ros_namespaces: vec!["shop"],
            nodes: true,
        });
        let config = ReportConfig {
            disable_cost_management: true,
            ..Default::default()
        };

        let summary = generate_reports(&config, &dirs, &engine, &hour(), &mut status)
            .await
            .unwrap();

        assert_eq!(
            dirs.reports.files().unwrap(),
            vec![
                "ros-openshift-container-202401.csv",
                "ros-openshift-namespace-202401.csv",
            ]
        );
        assert_eq!(summary.files.len(), 2);
        let header = read(&dirs, ReportKind::RosContainer);
        assert!(header.starts_with("report_period_start,report_period_end,interval_start,interval_end,"));
    }
}

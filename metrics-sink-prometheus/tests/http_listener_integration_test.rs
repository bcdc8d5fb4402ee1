#[cfg(all(test, feature = "http-listener"))]
mod http_listener_test {
    use http_body_util::{BodyExt, Collected, Empty};
    use hyper::{
        body::{Buf, Bytes},
        header::CONTENT_TYPE,
        Request, StatusCode, Uri,
    };
    use hyper_util::client::legacy::{connect::HttpConnector, Client};
    use metrics_sink_prometheus::{MetricRecord, PrometheusBuilder};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn rpc_record(port: &str, value: f64) -> MetricRecord {
        MetricRecord::new("RpcMetrics").with_tag("PORT", port).with_gauge("COUNTER", value)
    }

    #[test]
    fn test_http_listener() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|e| panic!("Failed to create test runtime: {:?}", e));

        runtime.block_on(async {
            let local = [127, 0, 0, 1];
            let port = get_available_port(local).await;
            let socket_address = SocketAddr::from((local, port));

            let (sink, exporter) = {
                PrometheusBuilder::new().with_http_listener(socket_address).build().unwrap_or_else(
                    |e| panic!("failed to create Prometheus sink and http listener: {:?}", e),
                )
            };

            sink.put_records(&[rpc_record("1234", 123.0), rpc_record("2345", 234.0)]);

            runtime.spawn(exporter);
            tokio::time::sleep(Duration::from_millis(200)).await;

            let uri = format!("http://{socket_address}/metrics")
                .parse::<Uri>()
                .unwrap_or_else(|e| panic!("Error parsing URI: {:?}", e));

            let (status, body, content_type) = read_from(uri).await;
            let body = String::from_utf8(body).unwrap();

            assert_eq!(status, StatusCode::OK);
            assert_eq!(content_type, "text/plain; version=0.0.4");
            assert!(body.contains("# TYPE rpc_metrics_counter gauge\n"));
            assert!(body.contains("rpc_metrics_counter{port=\"1234\"} 123\n"));
            assert!(body.contains("rpc_metrics_counter{port=\"2345\"} 234\n"));

            let uri = format!("http://{socket_address}/health")
                .parse::<Uri>()
                .unwrap_or_else(|e| panic!("Error parsing URI: {:?}", e));

            let (status, body, _) = read_from(uri).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, b"OK");
        });
    }

    #[test]
    fn test_http_listener_allowlist() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|e| panic!("Failed to create test runtime: {:?}", e));

        runtime.block_on(async {
            let local = [127, 0, 0, 1];
            let port = get_available_port(local).await;
            let socket_address = SocketAddr::from((local, port));

            let (sink, exporter) = PrometheusBuilder::new()
                .with_http_listener(socket_address)
                .add_allowed_address("10.0.0.0/8")
                .and_then(|builder| builder.build())
                .unwrap_or_else(|e| panic!("failed to create Prometheus sink: {:?}", e));

            sink.put_records(&[rpc_record("1234", 1.0)]);

            runtime.spawn(exporter);
            tokio::time::sleep(Duration::from_millis(200)).await;

            let uri = format!("http://{socket_address}")
                .parse::<Uri>()
                .unwrap_or_else(|e| panic!("Error parsing URI: {:?}", e));

            let (status, body, _) = read_from(uri).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert!(body.is_empty());
        });
    }

    #[test]
    fn test_collection_from_record_source() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|e| panic!("Failed to create test runtime: {:?}", e));

        runtime.block_on(async {
            let local = [127, 0, 0, 1];
            let port = get_available_port(local).await;
            let socket_address = SocketAddr::from((local, port));

            let cycles = Arc::new(AtomicU64::new(0));
            let source = {
                let cycles = Arc::clone(&cycles);
                move || {
                    let cycle = cycles.fetch_add(1, Ordering::SeqCst) + 1;
                    vec![MetricRecord::new("CollectorMetrics").with_counter("Cycles", cycle as f64)]
                }
            };

            let (sink, exporter) = PrometheusBuilder::new()
                .with_http_listener(socket_address)
                .with_record_source(source)
                .set_collection_interval(Duration::from_millis(20))
                .and_then(|builder| builder.build())
                .unwrap_or_else(|e| panic!("failed to create Prometheus sink: {:?}", e));

            runtime.spawn(exporter);
            tokio::time::sleep(Duration::from_millis(200)).await;

            assert!(cycles.load(Ordering::SeqCst) >= 2, "collection task did not run");

            let families = sink.handle().snapshot();
            assert_eq!(families.len(), 1);
            assert_eq!(families[0].name(), "collector_metrics_cycles");
            assert_eq!(families[0].len(), 1);

            let uri = format!("http://{socket_address}")
                .parse::<Uri>()
                .unwrap_or_else(|e| panic!("Error parsing URI: {:?}", e));

            let (status, body, _) = read_from(uri).await;
            assert_eq!(status, StatusCode::OK);
            assert!(String::from_utf8(body).unwrap().contains("collector_metrics_cycles "));
        });
    }

    #[test]
    fn test_collection_survives_panicking_source() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap_or_else(|e| panic!("Failed to create test runtime: {:?}", e));

        runtime.block_on(async {
            let local = [127, 0, 0, 1];
            let port = get_available_port(local).await;
            let socket_address = SocketAddr::from((local, port));

            let cycles = Arc::new(AtomicU64::new(0));
            let source = {
                let cycles = Arc::clone(&cycles);
                move || {
                    let cycle = cycles.fetch_add(1, Ordering::SeqCst) + 1;
                    if cycle == 2 {
                        panic!("record source failed on cycle {cycle}");
                    }
                    vec![MetricRecord::new("CollectorMetrics").with_gauge("LastCycle", cycle as f64)]
                }
            };

            let (sink, exporter) = PrometheusBuilder::new()
                .with_http_listener(socket_address)
                .with_record_source(source)
                .set_collection_interval(Duration::from_millis(20))
                .and_then(|builder| builder.build())
                .unwrap_or_else(|e| panic!("failed to create Prometheus sink: {:?}", e));

            runtime.spawn(exporter);
            tokio::time::sleep(Duration::from_millis(300)).await;

            assert!(cycles.load(Ordering::SeqCst) >= 4, "collection stopped after a panic");

            let families = sink.handle().snapshot();
            assert_eq!(families.len(), 1);
            let last = families[0].samples().next().map(|s| s.value()).unwrap_or_default();
            assert!(last >= 3.0, "collection did not resume after a panic: {last}");
        });
    }

    async fn get_available_port(listen_address: [u8; 4]) -> u16 {
        let socket_address = SocketAddr::from((listen_address, 0));
        TcpListener::bind(socket_address)
            .await
            .unwrap_or_else(|e| {
                panic!("Unable to bind to an available port on address {socket_address}: {:?}", e);
            })
            .local_addr()
            .expect("Unable to obtain local address from TcpListener")
            .port()
    }

    async fn read_from(endpoint: Uri) -> (StatusCode, Vec<u8>, String) {
        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(HttpConnector::new());

        let req = Request::builder()
            .uri(endpoint.to_string())
            .body(Empty::<Bytes>::new())
            .unwrap_or_else(|e| panic!("Failed building request: {:?}", e));

        let response = client
            .request(req)
            .await
            .unwrap_or_else(|e| panic!("Failed requesting data from {endpoint}: {:?}", e));

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let mut body = response
            .into_body()
            .collect()
            .await
            .map(Collected::aggregate)
            .unwrap_or_else(|e| panic!("Error reading response: {:?}", e));

        let body_bytes = body.copy_to_bytes(body.remaining()).to_vec();

        (status, body_bytes, content_type)
    }
}

// Copyright 2025-2026 CEMAXECUTER LLC

/// ZMQ publisher for streaming sweep records to a collector.
/// Sensor PUB socket connects out; the collector's SUB socket binds.
pub struct SpectrumPublisher {
    socket: zmq::Socket,
    sensor_id: Option<String>,
    _ctx: zmq::Context,
}

impl SpectrumPublisher {
    /// Create a PUB socket and connect it to `endpoint`.
    pub fn new(endpoint: &str, sensor_id: Option<&str>) -> Result<Self, String> {
        let ctx = zmq::Context::new();
        let socket = ctx
            .socket(zmq::PUB)
            .map_err(|e| format!("zmq PUB socket: {}", e))?;

        socket
            .set_sndhwm(1000)
            .map_err(|e| format!("zmq set_sndhwm: {}", e))?;

        socket
            .connect(endpoint)
            .map_err(|e| format!("zmq connect to {}: {}", endpoint, e))?;

        eprintln!("ZMQ PUB: connected to {}", endpoint);

        Ok(Self {
            socket,
            sensor_id: sensor_id.map(|s| s.to_string()),
            _ctx: ctx,
        })
    }

    /// Publish the sensor metadata on the "meta:" topic.
    pub fn send_announce(&self, meta: &serde_json::Value) {
        let _ = self.socket.send("meta:", zmq::DONTWAIT | zmq::SNDMORE);
        if let Some(ref id) = self.sensor_id {
            let _ = self.socket.send(id.as_bytes(), zmq::DONTWAIT | zmq::SNDMORE);
        }
        let _ = self.socket.send(meta.to_string().as_bytes(), zmq::DONTWAIT);
    }

    /// Publish one slice record (multipart: [sensor_id] record).
    pub fn send_record(&self, record: &[u8]) {
        if let Some(ref id) = self.sensor_id {
            let _ = self.socket.send(id.as_bytes(), zmq::DONTWAIT | zmq::SNDMORE);
        }
        let _ = self.socket.send(record, zmq::DONTWAIT);
    }
}

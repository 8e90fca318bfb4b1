// Copyright 2025 sudonet Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire-shape tests for the protocol module
//!
//! These pin the JSON layout of every message type so that peers built from
//! other codebases keep interoperating.

#[cfg(test)]
mod tests {
    use super::super::*;
    use serde_json::json;

    fn local(port: u16) -> NodeAddress {
        NodeAddress::new("127.0.0.1", port)
    }

    #[test]
    fn test_join_request_shape() {
        let msg = Message::join_request(local(9002));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "join_request", "data": {"node_ip": "127.0.0.1", "node_port": 9002}})
        );
    }

    #[test]
    fn test_join_ack_uses_address_pairs() {
        let msg = Message::join_ack(vec![local(9001), local(9003)]);
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "join_ack", "data": {"nodes": [["127.0.0.1", 9001], ["127.0.0.1", 9003]]}})
        );
    }

    #[test]
    fn test_update_nodes_action_is_lowercase() {
        let msg = Message::update_nodes(local(9002), UpdateAction::Remove);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["action"], "remove");
        assert_eq!(value["data"]["node_port"], 9002);
    }

    #[test]
    fn test_send_work_without_job_id_decodes() {
        let value = json!({
            "type": "send_work",
            "data": {
                "node_ip": "127.0.0.1",
                "node_port": 9001,
                "range": [0, 1],
                "solutions": [vec![vec![0u8; 9]; 9], vec![vec![1u8; 9]; 9]]
            }
        });
        let msg: Message = serde_json::from_value(value).unwrap();
        match msg {
            Message::SendWork(work) => {
                assert_eq!(work.node, local(9001));
                assert_eq!(work.range, Range::new(0, 1));
                assert_eq!(work.solutions.len(), 2);
                assert_eq!(work.solutions[1].cell(8, 8), 1);
                assert!(work.job_id.is_none());
            }
            other => panic!("Expected SendWork, got {:?}", other),
        }
    }

    #[test]
    fn test_job_id_is_omitted_when_absent() {
        let msg = Message::WorkDone(WorkDone {
            node: local(9001),
            range: Range::new(10, 19),
            job_id: None,
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value["data"].get("job_id").is_none());
        assert_eq!(value["data"]["range"], json!([10, 19]));

        let msg = Message::SolutionFound(SolutionFound {
            node: local(9001),
            solution_index: 12,
            job_id: Some(77),
        });
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["data"]["job_id"], 77);
        assert_eq!(value["data"]["solution_index"], 12);
    }

    #[test]
    fn test_hello_shape() {
        let value = json!({
            "type": "hello",
            "data": {
                "node_ip": "127.0.0.1",
                "node_port": 9003,
                "stats": {"solved": 2, "validations": 340},
                "network": [["127.0.0.1", 9001]]
            }
        });
        let msg: Message = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(msg.kind(), "hello");
        assert_eq!(serde_json::to_value(&msg).unwrap(), value);
        if let Message::Hello(hello) = msg {
            assert_eq!(hello.stats, HelloStats { solved: 2, validations: 340 });
            assert_eq!(hello.network, vec![local(9001)]);
        }
    }

    #[test]
    fn test_kind_matches_wire_type() {
        let messages = vec![
            Message::join_request(local(1)),
            Message::join_ack(vec![]),
            Message::update_nodes(local(1), UpdateAction::Insert),
            Message::SendWork(SendWork {
                node: local(1),
                range: Range::new(0, 0),
                solutions: vec![Grid::empty()],
                job_id: None,
            }),
            Message::work_ack(local(1)),
            Message::SolutionFound(SolutionFound { node: local(1), solution_index: 0, job_id: None }),
            Message::WorkDone(WorkDone { node: local(1), range: Range::new(0, 0), job_id: None }),
            Message::Hello(Hello { node: local(1), stats: HelloStats::default(), network: vec![] }),
        ];

        for (msg, expected) in messages.iter().zip(MESSAGE_TYPES.iter()) {
            let value = serde_json::to_value(msg).unwrap();
            assert_eq!(value["type"], *expected);
            assert_eq!(msg.kind(), *expected);
        }
    }
}

//! Broker that reads real positions but only logs orders.

use std::cell::RefCell;

use crate::domain::error::TraderError;
use crate::domain::position::Position;
use crate::ports::broker_port::{BrokerPort, OrderAck, OrderRequest};

pub struct DryRunBroker<'a> {
    inner: Option<&'a dyn BrokerPort>,
    submitted: RefCell<Vec<OrderRequest>>,
}

impl<'a> DryRunBroker<'a> {
    /// Without an inner broker every symbol is reported flat.
    pub fn new(inner: Option<&'a dyn BrokerPort>) -> Self {
        Self {
            inner,
            submitted: RefCell::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.borrow().clone()
    }
}

impl BrokerPort for DryRunBroker<'_> {
    fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, TraderError> {
        match self.inner {
            Some(inner) => inner.fetch_position(symbol),
            None => Ok(None),
        }
    }

    fn submit_market_order(&self, order: &OrderRequest) -> Result<OrderAck, TraderError> {
        let mut submitted = self.submitted.borrow_mut();
        if let Some(pos) = submitted
            .iter()
            .position(|o| o.client_order_id == order.client_order_id)
        {
            return Ok(OrderAck {
                order_id: format!("dry-run-{}", pos + 1),
                status: "dry_run".to_string(),
            });
        }
        submitted.push(order.clone());
        let order_id = format!("dry-run-{}", submitted.len());
        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            time_in_force = order.time_in_force.as_str(),
            order_id = %order_id,
            client_order_id = %order.client_order_id,
            "dry run: order not submitted"
        );
        Ok(OrderAck {
            order_id,
            status: "dry_run".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Side;
    use crate::ports::broker_port::{OrderSide, TimeInForce};

    struct OnePosition;

    impl BrokerPort for OnePosition {
        fn fetch_position(&self, symbol: &str) -> Result<Option<Position>, TraderError> {
            Ok((symbol == "NIO").then(|| Position {
                symbol: "NIO".into(),
                side: Side::Short,
                quantity: 10.0,
                avg_entry_price: 5.0,
            }))
        }

        fn submit_market_order(&self, _order: &OrderRequest) -> Result<OrderAck, TraderError> {
            panic!("dry run must not reach the inner broker");
        }
    }

    fn order() -> OrderRequest {
        OrderRequest {
            symbol: "NIO".into(),
            side: OrderSide::Buy,
            quantity: 10.0,
            time_in_force: TimeInForce::Day,
            client_order_id: "sig-1-NIO-buy".into(),
        }
    }

    #[test]
    fn positions_come_from_inner_broker() {
        let inner = OnePosition;
        let broker = DryRunBroker::new(Some(&inner));
        assert!(broker.fetch_position("NIO").unwrap().is_some());
        assert!(broker.fetch_position("AAPL").unwrap().is_none());
    }

    #[test]
    fn orders_are_recorded_not_forwarded() {
        let inner = OnePosition;
        let broker = DryRunBroker::new(Some(&inner));
        let ack = broker.submit_market_order(&order()).unwrap();
        assert_eq!(ack.order_id, "dry-run-1");
        assert_eq!(ack.status, "dry_run");
        assert_eq!(broker.submitted(), vec![order()]);
    }

    #[test]
    fn resubmitted_order_is_acknowledged_once() {
        let broker = DryRunBroker::new(None);
        let first = broker.submit_market_order(&order()).unwrap();
        let again = broker.submit_market_order(&order()).unwrap();
        assert_eq!(first, again);
        assert_eq!(broker.submitted().len(), 1);

        let next = OrderRequest {
            client_order_id: "sig-2-NIO-buy".into(),
            ..order()
        };
        assert_eq!(broker.submit_market_order(&next).unwrap().order_id, "dry-run-2");
    }

    #[test]
    fn without_inner_everything_is_flat() {
        let broker = DryRunBroker::new(None);
        assert_eq!(broker.fetch_position("NIO").unwrap(), None);
    }
}

mod test_auth;
mod test_node_lifecycle;
mod test_routing_scenarios;

use trantor_core::{NamingPolicy, Tier};

pub fn names(service: &str, tier: &str, domain: &str, format: &str) -> anyhow::Result<()> {
    let tier: Tier = tier.parse()?;
    let policy = NamingPolicy {
        domain: domain.to_string(),
        ..NamingPolicy::default()
    };
    let names = policy.derive(service, tier, None)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&names)?),
        _ => {
            println!("service     {}", names.service);
            println!("tier        {}", names.tier);
            println!("deployment  {}", names.deployment_name);
            println!("service     {}", names.service_name);
            println!("ingress     {}", names.ingress_name);
            println!("configmap   {}", names.config_name);
            println!("autoscaler  {}", names.autoscaler_name);
            println!("hostname    {}", names.hostname);
            let selector: Vec<String> = names.selector.iter().map(|(k, v)| format!("{k}={v}")).collect();
            println!("selector    {}", selector.join(","));
        }
    }
    Ok(())
}

use ctrkit::prelude::*;
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    let x = Array2::random((32, 10), Uniform::new(-1., 1.)).into_dyn();

    let config = DnnConfig::new(&[16, 8, 1])
        .with_activation(ActivationSpec::layer("Dice"))
        .with_l2(1e-5)
        .with_dropout_rate(0.1)
        .with_bn(true)
        .with_seed(1024);

    println!("{}", config.to_json()?);
    println!("expected output shape: {:?}", config.compute_output_shape(x.shape())?);

    let mut model = LazyDnn::new(config);

    let train_out = model.call(&x, Mode::Training)?;
    info!("training output shape {:?}", train_out.shape());

    let dnn = model
        .built()
        .ok_or_else(|| NNError::Other("block was not built".to_string()))?;
    println!("{}", dnn.summary());
    println!("l2 penalty: {}", dnn.regularization_loss());

    let prediction = dnn.predict(&x)?;
    println!("first predictions: {:?}", prediction.iter().take(4).collect::<Vec<_>>());

    dnn.save("./dnn.model")?;
    let restored = Dnn::load("./dnn.model")?;
    assert_eq!(restored.predict(&x)?, prediction);

    Ok(())
}
